use crate::common::constants::{SVP_EXPONENT, SVP_OFFSET_C, SVP_SCALE_KPA};

/// Saturation vapour pressure (kPa) at `temperature_c` (Tetens).
pub fn saturation_vapour_pressure(temperature_c: f64) -> f64 {
    SVP_SCALE_KPA * (SVP_EXPONENT * temperature_c / (temperature_c + SVP_OFFSET_C)).exp()
}

/// Vapour pressure deficit (kPa). Relative humidity is clamped to `0..=100`.
pub fn vapour_pressure_deficit(temperature_c: f64, relative_humidity: f64) -> Option<f64> {
    if !temperature_c.is_finite() || !relative_humidity.is_finite() {
        return None;
    }
    let humidity = relative_humidity.clamp(0.0, 100.0);
    Some(saturation_vapour_pressure(temperature_c) * (1.0 - humidity / 100.0))
}
