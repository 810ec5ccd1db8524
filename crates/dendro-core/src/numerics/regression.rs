use super::linalg::{DenseMatrix, SolveError, solve_symmetric};
use super::mean;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: Option<f64>,
    pub observations: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares `y = a + b x`. `None` when fewer than two pairs are
/// given or `x` has no spread.
pub fn fit_simple_linear(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r_squared = (syy > 0.0).then(|| (sxy * sxy) / (sxx * syy));

    Some(LinearFit {
        intercept,
        slope,
        r_squared,
        observations: x.len(),
    })
}

/// Solves the normal equations `XᵀX β = Xᵀy` for a row-major design matrix.
pub fn least_squares(design: &[Vec<f64>], response: &[f64]) -> Result<Vec<f64>, SolveError> {
    let columns = design.first().map_or(0, Vec::len);
    if design.len() != response.len() {
        return Err(SolveError::RhsLengthMismatch {
            expected: design.len(),
            actual: response.len(),
        });
    }

    let mut normal = DenseMatrix::zeros(columns, columns);
    let mut rhs = vec![0.0; columns];
    for (row, y) in design.iter().zip(response) {
        for i in 0..columns {
            rhs[i] += row[i] * y;
            for j in 0..columns {
                normal[(i, j)] += row[i] * row[j];
            }
        }
    }

    solve_symmetric(&normal, None, &rhs)
}

#[cfg(test)]
mod tests {
    use super::{fit_simple_linear, least_squares};

    #[test]
    fn simple_fit_recovers_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|value| 2.0 - 0.5 * value).collect();
        let fit = fit_simple_linear(&x, &y).expect("fit");

        assert!((fit.intercept - 2.0).abs() < 1.0e-12);
        assert!((fit.slope + 0.5).abs() < 1.0e-12);
        assert!((fit.r_squared.expect("r2") - 1.0).abs() < 1.0e-12);
        assert!((fit.predict(10.0) + 3.0).abs() < 1.0e-12);
        assert_eq!(fit.observations, 5);
    }

    #[test]
    fn simple_fit_requires_spread_in_predictor() {
        assert_eq!(fit_simple_linear(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(fit_simple_linear(&[1.0], &[1.0]), None);
    }

    #[test]
    fn least_squares_matches_simple_fit() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.1, 2.9, 5.2, 7.1, 8.8, 11.2];
        let design: Vec<Vec<f64>> = x.iter().map(|value| vec![1.0, *value]).collect();

        let coefficients = least_squares(&design, &y).expect("least squares");
        let simple = fit_simple_linear(&x, &y).expect("fit");
        assert!((coefficients[0] - simple.intercept).abs() < 1.0e-10);
        assert!((coefficients[1] - simple.slope).abs() < 1.0e-10);
    }
}
