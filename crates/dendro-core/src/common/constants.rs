//! Empirical and domain-standard constants shared by the pipeline stages.

/// Critical inter-series correlation for retaining a tree in its chronology.
pub const CRITICAL_SERIES_CORRELATION: f64 = 0.3281;
pub const DEFAULT_MIN_OVERLAP_YEARS: usize = 10;
pub const DEFAULT_MIN_TREES_PER_GROUP: usize = 3;

pub const DEFAULT_SPLINE_RIGIDITY_YEARS: f64 = 30.0;
pub const DEFAULT_SPLINE_FREQUENCY_RESPONSE: f64 = 0.5;
pub const DEFAULT_MIN_DETREND_POINTS: usize = 10;

/// Tetens saturation vapour pressure coefficients (kPa, °C).
pub const SVP_SCALE_KPA: f64 = 0.611;
pub const SVP_EXPONENT: f64 = 17.27;
pub const SVP_OFFSET_C: f64 = 237.3;

/// Hargreaves reference evapotranspiration.
pub const HARGREAVES_COEFFICIENT: f64 = 0.0023;
pub const HARGREAVES_TEMPERATURE_OFFSET_C: f64 = 17.8;
/// MJ m-2 day-1 to mm day-1 of evaporated water.
pub const RADIATION_TO_EVAPORATION: f64 = 0.408;
/// Extraterrestrial radiation scale, 24·60/π · Gsc (MJ m-2 day-1).
pub const EXTRATERRESTRIAL_RADIATION_SCALE: f64 = 37.6;

pub const DEFAULT_SPEI_SCALE_MONTHS: usize = 6;

pub const SEASON_THRESHOLD_C: f64 = 5.0;
pub const SEASON_RUN_DAYS: u32 = 4;
pub const SEASON_START_EARLIEST_DOY: u32 = 60;
pub const SEASON_END_EARLIEST_DOY: u32 = 243;
pub const SEASON_END_LATEST_DOY: u32 = 300;
pub const SEASON_DEGENERATE_LENGTH_DAYS: u32 = 360;
pub const SEASON_LEAD_DAYS: u32 = 3;

pub const DEFAULT_PRE_WINDOW_YEARS: u32 = 4;
pub const DEFAULT_POST_WINDOW_YEARS: u32 = 2;
pub const DEFAULT_EXTREME_FRACTION: f64 = 0.1;

pub const DEFAULT_RECENT_INCREMENT_YEARS: usize = 10;
pub const MM_PER_CM: f64 = 10.0;
