use crate::common::constants::{
    DEFAULT_MIN_DETREND_POINTS, DEFAULT_SPLINE_FREQUENCY_RESPONSE, DEFAULT_SPLINE_RIGIDITY_YEARS,
};
use crate::domain::{DendroError, ExclusionLog, PipelineStage, Series, SeriesTable};
use crate::numerics::spline::MIN_SPLINE_POINTS;
use crate::numerics::{SmoothingSpline, SplineError, interpolate_interior};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetrendForm {
    /// `observed / fitted`, a dimensionless index around 1.
    #[default]
    Ratio,
    /// `observed − fitted`, for covariates that cross zero.
    Difference,
}

impl DetrendForm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::Difference => "difference",
        }
    }
}

impl Display for DetrendForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for DetrendForm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ratio" => Ok(Self::Ratio),
            "difference" => Ok(Self::Difference),
            other => Err(format!(
                "unknown detrend form '{other}', expected 'ratio' or 'difference'"
            )),
        }
    }
}

impl From<SplineError> for DendroError {
    fn from(error: SplineError) -> Self {
        match error {
            SplineError::InvalidRigidity { .. } | SplineError::InvalidFrequencyResponse { .. } => {
                DendroError::input_validation("DETREND.PARAMETERS", error.to_string())
            }
            _ => DendroError::computation("DETREND.SPLINE", error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetrendConfig {
    pub rigidity_years: f64,
    pub frequency_response: f64,
    pub min_points: usize,
    pub form: DetrendForm,
}

impl Default for DetrendConfig {
    fn default() -> Self {
        Self {
            rigidity_years: DEFAULT_SPLINE_RIGIDITY_YEARS,
            frequency_response: DEFAULT_SPLINE_FREQUENCY_RESPONSE,
            min_points: DEFAULT_MIN_DETREND_POINTS,
            form: DetrendForm::Ratio,
        }
    }
}

impl DetrendConfig {
    pub fn spline(&self) -> SmoothingSpline {
        SmoothingSpline {
            rigidity: self.rigidity_years,
            frequency_response: self.frequency_response,
        }
    }

    fn required_points(&self) -> usize {
        self.min_points.max(MIN_SPLINE_POINTS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetrendReport<K: Ord> {
    pub indices: SeriesTable<K>,
    pub exclusions: ExclusionLog,
}

/// Detrends one series against its smoothing spline.
///
/// Interior gaps are filled linearly so the spline sees an unbroken run, but
/// every year missing in the input stays missing in the index. A series with
/// fewer than `min_points` values comes back all-missing with the same year
/// span.
pub fn detrend_series(series: &Series, config: &DetrendConfig) -> Result<Series, SplineError> {
    let all_missing = || Series::new(series.first_year(), vec![None; series.len()]);

    if series.count_present() < config.required_points() {
        return Ok(all_missing());
    }
    let Some((first, last)) = series.valid_range() else {
        return Ok(all_missing());
    };

    let filled = interpolate_interior(series.values());
    let start = (first - series.first_year()) as usize;
    let end = (last - series.first_year()) as usize;
    let observed: Vec<f64> = filled[start..=end].iter().flatten().copied().collect();
    let fitted = config.spline().fit(&observed)?;

    let mut values = vec![None; series.len()];
    for (offset, (observation, fit)) in observed.iter().zip(&fitted).enumerate() {
        if series.values()[start + offset].is_none() {
            continue;
        }
        values[start + offset] = match config.form {
            DetrendForm::Ratio if *fit > 0.0 && fit.is_finite() => Some(observation / fit),
            DetrendForm::Ratio => None,
            DetrendForm::Difference => Some(observation - fit),
        };
    }
    Ok(Series::new(series.first_year(), values))
}

/// Detrends every series of a table independently.
///
/// Invalid spline parameters are returned as errors; a series that cannot be
/// detrended is logged and kept as an all-missing column.
pub fn detrend_table<K>(
    table: &SeriesTable<K>,
    config: &DetrendConfig,
) -> Result<DetrendReport<K>, SplineError>
where
    K: Ord + Clone + Display,
{
    config.spline().check_parameters()?;

    let mut exclusions = ExclusionLog::default();
    let indices = table.map_series(|key, series| {
        let present = series.count_present();
        if present < config.required_points() {
            exclusions.record(
                PipelineStage::Detrend,
                key.to_string(),
                format!(
                    "{present} measured years, at least {} required",
                    config.required_points()
                ),
            );
        }
        match detrend_series(series, config) {
            Ok(index) => index,
            Err(error) => {
                exclusions.record(PipelineStage::Detrend, key.to_string(), error.to_string());
                Series::new(series.first_year(), vec![None; series.len()])
            }
        }
    });

    tracing::info!(
        series = indices.len(),
        rigidity = config.rigidity_years,
        form = %config.form,
        "detrended series"
    );
    Ok(DetrendReport {
        indices,
        exclusions,
    })
}
