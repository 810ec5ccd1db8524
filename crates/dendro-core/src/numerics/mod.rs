pub mod linalg;
pub mod regression;
pub mod spline;

pub use linalg::{
    CholeskyFactor, DenseMatrix, SolveError, cholesky_factorize, solve_symmetric,
};
pub use regression::{LinearFit, fit_simple_linear, least_squares};
pub use spline::{SmoothingSpline, SplineError, cook_peters_smoothing_parameter};

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for value in values {
        let adjusted = value - compensation;
        let next = sum + adjusted;
        compensation = (next - sum) - adjusted;
        sum = next;
    }
    sum
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

/// Mean of the present entries; `None` when nothing is present.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    mean(&present)
}

pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let center = mean(values)?;
    let squares: Vec<f64> = values.iter().map(|value| (value - center).powi(2)).collect();
    Some(stable_sum(&squares) / (values.len() - 1) as f64)
}

/// Pearson correlation; `None` when lengths differ, fewer than two pairs
/// exist, or either side has zero variance.
pub fn pearson(lhs: &[f64], rhs: &[f64]) -> Option<f64> {
    if lhs.len() != rhs.len() || lhs.len() < 2 {
        return None;
    }

    let lhs_mean = mean(lhs)?;
    let rhs_mean = mean(rhs)?;
    let mut covariance = 0.0;
    let mut lhs_ss = 0.0;
    let mut rhs_ss = 0.0;
    for (x, y) in lhs.iter().zip(rhs) {
        let dx = x - lhs_mean;
        let dy = y - rhs_mean;
        covariance += dx * dy;
        lhs_ss += dx * dx;
        rhs_ss += dy * dy;
    }

    if lhs_ss <= 0.0 || rhs_ss <= 0.0 {
        return None;
    }

    let correlation = covariance / (lhs_ss * rhs_ss).sqrt();
    correlation.is_finite().then(|| correlation.clamp(-1.0, 1.0))
}

pub fn deterministic_argsort(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_unstable_by(|lhs, rhs| {
        values[*lhs]
            .total_cmp(&values[*rhs])
            .then_with(|| lhs.cmp(rhs))
    });
    indices
}

/// Linear interpolation across interior `None` runs. Leading and trailing
/// missing values are left untouched.
pub fn interpolate_interior(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut filled = values.to_vec();
    let Some(first) = values.iter().position(Option::is_some) else {
        return filled;
    };
    let Some(last) = values.iter().rposition(Option::is_some) else {
        return filled;
    };

    let mut anchor = first;
    for index in (first + 1)..=last {
        let Some(right) = values[index] else {
            continue;
        };
        let gap = index - anchor;
        if gap > 1 {
            if let Some(left) = values[anchor] {
                for step in 1..gap {
                    let weight = step as f64 / gap as f64;
                    filled[anchor + step] = Some(left + (right - left) * weight);
                }
            }
        }
        anchor = index;
    }

    filled
}
