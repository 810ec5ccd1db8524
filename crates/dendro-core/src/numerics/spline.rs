//! Cook–Peters cubic smoothing spline on a unit-spaced grid.
//!
//! The spline is parameterized by its rigidity: the wavelength (in samples)
//! at which the frequency response of the smoother drops to
//! `frequency_response` (0.5 by convention).

use super::linalg::{DenseMatrix, SolveError, solve_symmetric};
use crate::common::constants::DEFAULT_SPLINE_FREQUENCY_RESPONSE;
use std::f64::consts::PI;

pub const MIN_SPLINE_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("smoothing spline requires at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },
    #[error("spline rigidity must be greater than 2 samples, got {rigidity}")]
    InvalidRigidity { rigidity: f64 },
    #[error("spline frequency response must lie in (0, 1), got {response}")]
    InvalidFrequencyResponse { response: f64 },
    #[error("spline input contains a non-finite value at index {index}")]
    NonFiniteInput { index: usize },
    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Smoothing parameter `p` giving a response of `frequency_response` at a
/// wavelength of `rigidity` samples.
pub fn cook_peters_smoothing_parameter(rigidity: f64, frequency_response: f64) -> f64 {
    let cosine = (2.0 * PI / rigidity).cos();
    let p_inverse = (1.0 - frequency_response) * (cosine + 2.0)
        / (12.0 * (cosine - 1.0).powi(2))
        / frequency_response
        + 1.0;
    1.0 / p_inverse
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingSpline {
    pub rigidity: f64,
    pub frequency_response: f64,
}

impl SmoothingSpline {
    pub fn with_rigidity(rigidity: f64) -> Self {
        Self {
            rigidity,
            frequency_response: DEFAULT_SPLINE_FREQUENCY_RESPONSE,
        }
    }

    pub fn smoothing_parameter(&self) -> f64 {
        cook_peters_smoothing_parameter(self.rigidity, self.frequency_response)
    }

    /// Returns the smoothed values at the input positions.
    pub fn fit(&self, values: &[f64]) -> Result<Vec<f64>, SplineError> {
        self.validate(values)?;

        let n = values.len();
        let p = self.smoothing_parameter();
        let multiplier = 6.0 * (1.0 - p);
        let interior = n - 2;

        let mut system = DenseMatrix::zeros(interior, interior);
        for row in 0..interior {
            system[(row, row)] = multiplier * 6.0 + p * 4.0;
            if row >= 1 {
                let band = multiplier * -4.0 + p;
                system[(row, row - 1)] = band;
                system[(row - 1, row)] = band;
            }
            if row >= 2 {
                system[(row, row - 2)] = multiplier;
                system[(row - 2, row)] = multiplier;
            }
        }

        let rhs: Vec<f64> = values
            .windows(3)
            .map(|window| window[2] - 2.0 * window[1] + window[0])
            .collect();
        let curvature = solve_symmetric(&system, Some(2), &rhs)?;

        // Zero-padded on both sides so the second difference below covers
        // the boundary knots.
        let mut padded = vec![0.0; n + 2];
        padded[2..n].copy_from_slice(&curvature);

        Ok(values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let second_difference =
                    padded[index + 2] - 2.0 * padded[index + 1] + padded[index];
                value - multiplier * second_difference
            })
            .collect())
    }

    pub fn check_parameters(&self) -> Result<(), SplineError> {
        if !(self.rigidity.is_finite() && self.rigidity > 2.0) {
            return Err(SplineError::InvalidRigidity {
                rigidity: self.rigidity,
            });
        }
        if !(self.frequency_response > 0.0 && self.frequency_response < 1.0) {
            return Err(SplineError::InvalidFrequencyResponse {
                response: self.frequency_response,
            });
        }
        Ok(())
    }

    fn validate(&self, values: &[f64]) -> Result<(), SplineError> {
        self.check_parameters()?;
        if values.len() < MIN_SPLINE_POINTS {
            return Err(SplineError::TooFewPoints {
                required: MIN_SPLINE_POINTS,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(SplineError::NonFiniteInput { index });
        }
        Ok(())
    }
}
