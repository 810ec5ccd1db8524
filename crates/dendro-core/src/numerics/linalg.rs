//! Symmetric positive-definite solves for the smoothing-spline band system
//! and the normal equations of the model fitter.

use faer::Mat;

pub type DenseMatrix = Mat<f64>;

/// Pivots at or below this fraction of the largest diagonal entry count as
/// zero.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error("expected a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("cannot factor an empty matrix")]
    EmptyMatrix,
    #[error("matrix is not positive definite at pivot {pivot_index}")]
    NotPositiveDefinite { pivot_index: usize },
    #[error("right-hand side has {actual} entries, system has {expected}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Lower Cholesky factor `L` with `A = L Lᵀ`. Entries further than
/// `half_bandwidth` below the diagonal are never read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    lower: DenseMatrix,
    half_bandwidth: usize,
}

impl CholeskyFactor {
    pub fn dimension(&self) -> usize {
        self.lower.nrows()
    }

    pub fn half_bandwidth(&self) -> usize {
        self.half_bandwidth
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, SolveError> {
        let n = self.dimension();
        if rhs.len() != n {
            return Err(SolveError::RhsLengthMismatch {
                expected: n,
                actual: rhs.len(),
            });
        }
        let w = self.half_bandwidth;

        // L z = b
        let mut z = vec![0.0; n];
        for i in 0..n {
            let band_start = i.saturating_sub(w);
            let reduced = (band_start..i).fold(rhs[i], |acc, k| acc - self.lower[(i, k)] * z[k]);
            z[i] = reduced / self.lower[(i, i)];
        }

        // Lᵀ x = z
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let band_end = (i + w).min(n - 1);
            let reduced =
                ((i + 1)..=band_end).fold(z[i], |acc, k| acc - self.lower[(k, i)] * x[k]);
            x[i] = reduced / self.lower[(i, i)];
        }

        Ok(x)
    }
}

/// Factors a symmetric matrix reading only its lower triangle. `None` treats
/// the matrix as dense.
pub fn cholesky_factorize(
    matrix: &DenseMatrix,
    half_bandwidth: Option<usize>,
) -> Result<CholeskyFactor, SolveError> {
    let n = square_dimension(matrix)?;
    let w = half_bandwidth.unwrap_or(n - 1).min(n - 1);
    let scale = (0..n)
        .map(|i| matrix[(i, i)].abs())
        .fold(0.0_f64, f64::max);
    let tolerance = RELATIVE_PIVOT_TOLERANCE * scale;

    let mut lower = DenseMatrix::zeros(n, n);
    for i in 0..n {
        let band_start = i.saturating_sub(w);
        for j in band_start..=i {
            let reduced = (band_start..j).fold(matrix[(i, j)], |acc, k| {
                acc - lower[(i, k)] * lower[(j, k)]
            });
            if i == j {
                if reduced.is_nan() || reduced <= tolerance {
                    return Err(SolveError::NotPositiveDefinite { pivot_index: i });
                }
                lower[(i, i)] = reduced.sqrt();
            } else {
                lower[(i, j)] = reduced / lower[(j, j)];
            }
        }
    }

    Ok(CholeskyFactor {
        lower,
        half_bandwidth: w,
    })
}

pub fn solve_symmetric(
    matrix: &DenseMatrix,
    half_bandwidth: Option<usize>,
    rhs: &[f64],
) -> Result<Vec<f64>, SolveError> {
    cholesky_factorize(matrix, half_bandwidth)?.solve(rhs)
}

fn square_dimension(matrix: &DenseMatrix) -> Result<usize, SolveError> {
    let (rows, cols) = (matrix.nrows(), matrix.ncols());
    match (rows, cols) {
        (0, _) | (_, 0) => Err(SolveError::EmptyMatrix),
        _ if rows != cols => Err(SolveError::NonSquareMatrix { rows, cols }),
        _ => Ok(rows),
    }
}
