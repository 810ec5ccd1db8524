pub mod extremes;
pub mod resilience;
pub mod sensitivity;

pub use extremes::{ExtremeTail, coincidence_rate, extreme_ratio, extreme_years, tail_size};
pub use resilience::{ResilienceComponents, resilience_components};
pub use sensitivity::{group_sensitivity, mean_sensitivity};

use crate::common::constants::{
    DEFAULT_EXTREME_FRACTION, DEFAULT_POST_WINDOW_YEARS, DEFAULT_PRE_WINDOW_YEARS,
};
use crate::modules::climate::ClimateDriver;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EcologyConfig {
    /// First year entering sensitivity; all years when absent.
    pub sensitivity_start_year: Option<i32>,
    pub pre_window_years: u32,
    pub post_window_years: u32,
    /// Used for plots without a recorded clearcut year.
    pub disturbance_year: Option<i32>,
    pub extreme_fraction: f64,
    pub climate_tail: ExtremeTail,
    pub driver: ClimateDriver,
}

impl Default for EcologyConfig {
    fn default() -> Self {
        Self {
            sensitivity_start_year: None,
            pre_window_years: DEFAULT_PRE_WINDOW_YEARS,
            post_window_years: DEFAULT_POST_WINDOW_YEARS,
            disturbance_year: None,
            extreme_fraction: DEFAULT_EXTREME_FRACTION,
            climate_tail: ExtremeTail::High,
            driver: ClimateDriver::SeasonTemperature,
        }
    }
}

impl EcologyConfig {
    /// Disturbance year for a plot: its clearcut year, else the configured one.
    pub fn disturbance_for(&self, clearcut_year: Option<i32>) -> Option<i32> {
        clearcut_year.or(self.disturbance_year)
    }
}

#[cfg(test)]
mod tests {
    use super::EcologyConfig;

    #[test]
    fn clearcut_year_takes_precedence_over_configured_disturbance() {
        let config = EcologyConfig {
            disturbance_year: Some(2006),
            ..EcologyConfig::default()
        };
        assert_eq!(config.disturbance_for(Some(1998)), Some(1998));
        assert_eq!(config.disturbance_for(None), Some(2006));
        assert_eq!(EcologyConfig::default().disturbance_for(None), None);
    }
}
