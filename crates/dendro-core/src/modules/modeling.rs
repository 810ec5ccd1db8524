use crate::domain::DendroError;
use crate::numerics::{SolveError, least_squares, mean};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named numeric columns of one feature-table row; missing cells are `None`.
pub type FeatureRow = BTreeMap<String, Option<f64>>;

pub const INTERCEPT_TERM: &str = "(intercept)";

/// Which feature table a model is fitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureTable {
    #[default]
    Plot,
    Tree,
}

impl FeatureTable {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plot => "plot",
            Self::Tree => "tree",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelSpec {
    pub table: FeatureTable,
    pub response: String,
    pub predictors: Vec<String>,
    /// Grouping columns for random intercepts.
    pub random_effects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub response: String,
    pub coefficients: Vec<(String, f64)>,
    pub observations: usize,
    pub dropped_rows: usize,
    pub r_squared: Option<f64>,
}

impl ModelSummary {
    pub fn coefficient(&self, term: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|(name, _)| name == term)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelFitError {
    #[error("model has no response column")]
    MissingResponse,
    #[error("column '{column}' is not present in the feature table")]
    UnknownColumn { column: String },
    #[error("random effects ({groups}) are not supported by this fitter")]
    RandomEffectsUnsupported { groups: String },
    #[error("{actual} complete rows, at least {required} required")]
    TooFewObservations { required: usize, actual: usize },
    #[error("design matrix is rank deficient: {0}")]
    Singular(#[from] SolveError),
}

impl From<ModelFitError> for DendroError {
    fn from(error: ModelFitError) -> Self {
        DendroError::computation("MODEL.FIT", error.to_string())
    }
}

pub trait ModelFitter {
    fn fit(&self, rows: &[FeatureRow], spec: &ModelSpec) -> Result<ModelSummary, ModelFitError>;
}

/// Fixed-effects ordinary least squares with listwise deletion of rows
/// missing any model column.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinaryLeastSquares;

impl ModelFitter for OrdinaryLeastSquares {
    fn fit(&self, rows: &[FeatureRow], spec: &ModelSpec) -> Result<ModelSummary, ModelFitError> {
        if spec.response.trim().is_empty() {
            return Err(ModelFitError::MissingResponse);
        }
        if !spec.random_effects.is_empty() {
            return Err(ModelFitError::RandomEffectsUnsupported {
                groups: spec.random_effects.join(", "),
            });
        }

        let columns: Vec<&str> = std::iter::once(spec.response.as_str())
            .chain(spec.predictors.iter().map(String::as_str))
            .collect();
        for column in &columns {
            if !rows.iter().any(|row| row.contains_key(*column)) {
                return Err(ModelFitError::UnknownColumn {
                    column: column.to_string(),
                });
            }
        }

        let complete: Vec<Vec<f64>> = rows
            .iter()
            .filter_map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(*column).copied().flatten())
                    .collect::<Option<Vec<f64>>>()
            })
            .collect();

        let parameters = spec.predictors.len() + 1;
        if complete.len() <= parameters {
            return Err(ModelFitError::TooFewObservations {
                required: parameters + 1,
                actual: complete.len(),
            });
        }

        let response: Vec<f64> = complete.iter().map(|values| values[0]).collect();
        let design: Vec<Vec<f64>> = complete
            .iter()
            .map(|values| {
                let mut row = Vec::with_capacity(parameters);
                row.push(1.0);
                row.extend_from_slice(&values[1..]);
                row
            })
            .collect();
        let estimates = least_squares(&design, &response)?;

        let center = mean(&response).unwrap_or_default();
        let (mut residual_ss, mut total_ss) = (0.0, 0.0);
        for (row, observed) in design.iter().zip(&response) {
            let fitted: f64 = row.iter().zip(&estimates).map(|(x, b)| x * b).sum();
            residual_ss += (observed - fitted).powi(2);
            total_ss += (observed - center).powi(2);
        }
        let r_squared = (total_ss > 0.0).then(|| 1.0 - residual_ss / total_ss);

        let coefficients = std::iter::once(INTERCEPT_TERM.to_string())
            .chain(spec.predictors.iter().cloned())
            .zip(estimates)
            .collect();

        Ok(ModelSummary {
            response: spec.response.clone(),
            coefficients,
            observations: complete.len(),
            dropped_rows: rows.len() - complete.len(),
            r_squared,
        })
    }
}
