//! Climate indicators derived from daily station records: monthly
//! aggregates with PET, water balance and SPEI, and growing-season windows
//! with their within-season summaries.

pub mod season;
pub mod spei;
pub mod vpd;

pub use season::{SeasonConfig, SeasonGap, SeasonWindow, detect_growing_season};
pub use spei::{LogLogistic, LogLogisticSpei, SpeiEstimator, hargreaves_monthly_pet};
pub use vpd::{saturation_vapour_pressure, vapour_pressure_deficit};

use crate::common::constants::DEFAULT_SPEI_SCALE_MONTHS;
use crate::domain::{DailyClimate, ExclusionLog, PipelineStage, Series};
use crate::numerics::{mean, mean_present};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClimateConfig {
    pub spei_scale_months: usize,
    pub season: SeasonConfig,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            spei_scale_months: DEFAULT_SPEI_SCALE_MONTHS,
            season: SeasonConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyClimate {
    pub station: String,
    pub year: i32,
    pub month: u32,
    pub observed_days: usize,
    pub t_mean: Option<f64>,
    pub t_min: Option<f64>,
    pub t_max: Option<f64>,
    pub precip_mm: Option<f64>,
    pub vpd_kpa: Option<f64>,
    /// Deficit at the daily maximum temperature.
    pub vpd_max_kpa: Option<f64>,
    pub pet_mm: Option<f64>,
    pub water_balance_mm: Option<f64>,
    pub spei: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowingSeason {
    pub station: String,
    pub year: i32,
    pub window: SeasonWindow,
    pub mean_temperature: Option<f64>,
    pub mean_precip_mm: Option<f64>,
    pub mean_vpd_kpa: Option<f64>,
    pub mean_spei: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClimateReport {
    pub monthly: Vec<MonthlyClimate>,
    pub seasons: Vec<GrowingSeason>,
    pub exclusions: ExclusionLog,
}

/// Annual climate covariate taken from the growing-season summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClimateDriver {
    #[default]
    SeasonTemperature,
    SeasonPrecipitation,
    SeasonVpd,
    SeasonSpei,
    SeasonLength,
}

impl ClimateDriver {
    pub fn value(self, season: &GrowingSeason) -> Option<f64> {
        match self {
            Self::SeasonTemperature => season.mean_temperature,
            Self::SeasonPrecipitation => season.mean_precip_mm,
            Self::SeasonVpd => season.mean_vpd_kpa,
            Self::SeasonSpei => season.mean_spei,
            Self::SeasonLength => Some(f64::from(season.window.length_days)),
        }
    }
}

impl ClimateReport {
    pub fn seasons_for<'a>(&'a self, station: &'a str) -> impl Iterator<Item = &'a GrowingSeason> {
        self.seasons
            .iter()
            .filter(move |season| season.station == station)
    }

    /// Year-indexed driver series for one station.
    pub fn driver_series(&self, station: &str, driver: ClimateDriver) -> Series {
        let pairs: BTreeMap<i32, f64> = self
            .seasons_for(station)
            .filter_map(|season| driver.value(season).map(|value| (season.year, value)))
            .collect();
        Series::from_pairs(pairs).unwrap_or_default()
    }
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

fn daily_vpd(day: &DailyClimate) -> Option<f64> {
    vapour_pressure_deficit(day.t_mean?, day.rh_percent?)
}

/// Means of the daily fields per `(station, year, month)`; precipitation is
/// summed. PET, water balance and SPEI are left empty.
pub fn aggregate_monthly(daily: &[DailyClimate]) -> Vec<MonthlyClimate> {
    let mut groups: BTreeMap<(&str, i32, u32), Vec<&DailyClimate>> = BTreeMap::new();
    for day in daily {
        groups
            .entry((day.station.as_str(), day.date.year(), day.date.month()))
            .or_default()
            .push(day);
    }

    groups
        .into_iter()
        .map(|((station, year, month), days)| {
            let collect = |field: fn(&DailyClimate) -> Option<f64>| -> Vec<Option<f64>> {
                days.iter().map(|day| field(*day)).collect()
            };
            let precipitation: Vec<f64> = days.iter().filter_map(|day| day.precip_mm).collect();
            MonthlyClimate {
                station: station.to_string(),
                year,
                month,
                observed_days: days.len(),
                t_mean: mean_present(&collect(|day| day.t_mean)),
                t_min: mean_present(&collect(|day| day.t_min)),
                t_max: mean_present(&collect(|day| day.t_max)),
                precip_mm: (!precipitation.is_empty()).then(|| precipitation.iter().sum()),
                vpd_kpa: mean_present(&collect(daily_vpd)),
                vpd_max_kpa: mean_present(&collect(|day| {
                    vapour_pressure_deficit(day.t_max?, day.rh_percent?)
                })),
                pet_mm: None,
                water_balance_mm: None,
                spei: None,
            }
        })
        .collect()
}

/// Fills PET, water balance and SPEI for one station's months. `monthly`
/// must be sorted by `(year, month)`; absent months are treated as missing
/// so the SPEI window never bridges a gap.
pub fn attach_water_balance(
    monthly: &mut [MonthlyClimate],
    latitude_deg: f64,
    estimator: &dyn SpeiEstimator,
) {
    for month in monthly.iter_mut() {
        let Some(days) = days_in_month(month.year, month.month) else {
            continue;
        };
        month.pet_mm = match (month.t_mean, month.t_min, month.t_max) {
            (Some(t_mean), Some(t_min), Some(t_max)) => Some(hargreaves_monthly_pet(
                t_mean,
                t_min,
                t_max,
                latitude_deg,
                month.month,
                days,
            )),
            _ => None,
        };
        month.water_balance_mm = month
            .precip_mm
            .zip(month.pet_mm)
            .map(|(precip, pet)| precip - pet);
    }

    let (Some(first), Some(last)) = (monthly.first(), monthly.last()) else {
        return;
    };
    let month_number = |year: i32, month: u32| year * 12 + month as i32 - 1;
    let start = month_number(first.year, first.month);
    let end = month_number(last.year, last.month);

    let by_month: BTreeMap<i32, usize> = monthly
        .iter()
        .enumerate()
        .map(|(position, month)| (month_number(month.year, month.month), position))
        .collect();
    let balance: Vec<(u32, Option<f64>)> = (start..=end)
        .map(|number| {
            let calendar = number.rem_euclid(12) as u32 + 1;
            let value = by_month
                .get(&number)
                .and_then(|position| monthly[*position].water_balance_mm);
            (calendar, value)
        })
        .collect();

    let index = estimator.standardize(&balance);
    for (number, spei) in (start..=end).zip(index) {
        if let Some(position) = by_month.get(&number) {
            monthly[*position].spei = spei;
        }
    }
}

/// Runs the monthly and growing-season calculations for every station with
/// a known latitude. Stations without one are logged and skipped.
pub fn compute_climate(
    daily: &[DailyClimate],
    latitudes: &BTreeMap<String, f64>,
    config: &ClimateConfig,
) -> ClimateReport {
    let estimator = LogLogisticSpei {
        scale_months: config.spei_scale_months,
    };
    compute_climate_with(daily, latitudes, config, &estimator)
}

pub fn compute_climate_with(
    daily: &[DailyClimate],
    latitudes: &BTreeMap<String, f64>,
    config: &ClimateConfig,
    estimator: &dyn SpeiEstimator,
) -> ClimateReport {
    let mut report = ClimateReport::default();
    let mut by_station: BTreeMap<&str, Vec<DailyClimate>> = BTreeMap::new();
    for day in daily {
        by_station
            .entry(day.station.as_str())
            .or_default()
            .push(day.clone());
    }

    for (station, mut days) in by_station {
        let Some(latitude) = latitudes.get(station).copied() else {
            report.exclusions.record(
                PipelineStage::Climate,
                station,
                "no latitude known for station",
            );
            continue;
        };
        days.sort_by_key(|day| day.date);

        let mut monthly = aggregate_monthly(&days);
        attach_water_balance(&mut monthly, latitude, estimator);
        let seasons = growing_seasons(&days, &monthly, &config.season, &mut report.exclusions);

        tracing::info!(
            station,
            months = monthly.len(),
            seasons = seasons.len(),
            "computed station climate"
        );
        report.monthly.extend(monthly);
        report.seasons.extend(seasons);
    }

    report
}

/// Growing season and within-season means for each year of one station.
/// `days` must belong to a single station.
pub fn growing_seasons(
    days: &[DailyClimate],
    monthly: &[MonthlyClimate],
    config: &SeasonConfig,
    exclusions: &mut ExclusionLog,
) -> Vec<GrowingSeason> {
    let spei_by_month: BTreeMap<(i32, u32), f64> = monthly
        .iter()
        .filter_map(|month| month.spei.map(|spei| ((month.year, month.month), spei)))
        .collect();

    let mut by_year: BTreeMap<i32, BTreeMap<u32, &DailyClimate>> = BTreeMap::new();
    for day in days {
        by_year
            .entry(day.date.year())
            .or_default()
            .insert(day.date.ordinal(), day);
    }

    let mut seasons = Vec::new();
    for (year, calendar) in by_year {
        let Some(station) = calendar.values().next().map(|day| day.station.clone()) else {
            continue;
        };
        let temperatures: BTreeMap<u32, f64> = calendar
            .iter()
            .filter_map(|(doy, day)| day.t_mean.map(|t| (*doy, t)))
            .collect();

        let window = match detect_growing_season(&temperatures, config) {
            Ok(window) => window,
            Err(gap) => {
                exclusions.record(
                    PipelineStage::Season,
                    format!("{station} {year}"),
                    gap.to_string(),
                );
                continue;
            }
        };

        let in_season: Vec<&DailyClimate> = window
            .summary_days(config.lead_days)
            .filter_map(|doy| calendar.get(&doy).copied())
            .collect();
        let field = |extract: &dyn Fn(&DailyClimate) -> Option<f64>| -> Option<f64> {
            let values: Vec<f64> = in_season.iter().filter_map(|day| extract(*day)).collect();
            mean(&values)
        };

        seasons.push(GrowingSeason {
            station,
            year,
            window,
            mean_temperature: field(&|day| day.t_mean),
            mean_precip_mm: field(&|day| day.precip_mm),
            mean_vpd_kpa: field(&daily_vpd),
            mean_spei: field(&|day| {
                spei_by_month
                    .get(&(day.date.year(), day.date.month()))
                    .copied()
            }),
        });
    }

    seasons
}

#[cfg(test)]
mod tests {
    use super::{
        ClimateConfig, ClimateDriver, aggregate_monthly, attach_water_balance, compute_climate,
        days_in_month,
    };
    use crate::domain::{DailyClimate, PipelineStage};
    use crate::modules::climate::spei::LogLogisticSpei;
    use chrono::{Datelike, NaiveDate};
    use std::collections::BTreeMap;

    fn synthetic_station(station: &str, years: std::ops::RangeInclusive<i32>) -> Vec<DailyClimate> {
        let mut records = Vec::new();
        for year in years {
            let mut date = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date");
            while date.year() == year {
                let doy = f64::from(date.ordinal());
                let wobble = ((year * 7 + date.ordinal() as i32) % 5) as f64 * 0.3;
                let t_mean = -8.0 + 22.0 * ((doy - 15.0) / 370.0 * std::f64::consts::PI).sin()
                    + wobble;
                records.push(DailyClimate {
                    station: station.to_string(),
                    date,
                    t_mean: Some(t_mean),
                    t_min: Some(t_mean - 5.0),
                    t_max: Some(t_mean + 5.0),
                    precip_mm: Some(1.0 + ((year + date.ordinal() as i32) % 7) as f64 * 0.5),
                    rh_percent: Some(75.0),
                });
                date = date.succ_opt().expect("next date");
            }
        }
        records
    }

    #[test]
    fn month_lengths_follow_the_calendar() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2023, 12), Some(31));
        assert_eq!(days_in_month(2023, 13), None);
    }

    #[test]
    fn monthly_aggregation_sums_precipitation_and_averages_temperature() {
        let records = synthetic_station("S1", 2001..=2001);
        let monthly = aggregate_monthly(&records);
        assert_eq!(monthly.len(), 12);

        let january = &monthly[0];
        assert_eq!((january.year, january.month), (2001, 1));
        assert_eq!(january.observed_days, 31);
        let expected_precip: f64 = records
            .iter()
            .filter(|day| day.date.month() == 1)
            .filter_map(|day| day.precip_mm)
            .sum();
        assert!((january.precip_mm.expect("precip") - expected_precip).abs() < 1.0e-9);
        assert!(january.vpd_max_kpa.expect("vpd max") > january.vpd_kpa.expect("vpd"));
        assert_eq!(january.spei, None);
    }

    #[test]
    fn water_balance_and_spei_are_reattached_by_month() {
        let records = synthetic_station("S1", 1991..=2010);
        let mut monthly = aggregate_monthly(&records);
        attach_water_balance(&mut monthly, 62.0, &LogLogisticSpei::default());

        for month in &monthly {
            let pet = month.pet_mm.expect("pet should be defined");
            assert!(pet >= 0.0);
            let balance = month.water_balance_mm.expect("balance");
            assert!((balance - (month.precip_mm.expect("precip") - pet)).abs() < 1.0e-9);
        }
        assert!(monthly[..5].iter().all(|month| month.spei.is_none()));
        assert!(monthly[12..].iter().all(|month| month.spei.is_some()));
    }

    #[test]
    fn stations_without_latitude_are_excluded() {
        let records = synthetic_station("S9", 2001..=2002);
        let report = compute_climate(&records, &BTreeMap::new(), &ClimateConfig::default());
        assert!(report.monthly.is_empty());
        assert_eq!(report.exclusions.count_for(PipelineStage::Climate), 1);
    }

    #[test]
    fn seasons_summarize_each_station_year() {
        let records = synthetic_station("S1", 2001..=2004);
        let latitudes = BTreeMap::from([("S1".to_string(), 62.0)]);
        let report = compute_climate(&records, &latitudes, &ClimateConfig::default());

        assert_eq!(report.monthly.len(), 48);
        assert_eq!(report.seasons.len(), 4);
        for season in &report.seasons {
            assert!(season.window.start_doy >= 60);
            assert!(season.window.end_doy <= 300);
            let temperature = season.mean_temperature.expect("season temperature");
            assert!(temperature > 5.0);
            assert!(season.mean_vpd_kpa.is_some());
        }

        let driver = report.driver_series("S1", ClimateDriver::SeasonLength);
        assert_eq!(driver.first_year(), 2001);
        assert_eq!(driver.count_present(), 4);
    }
}
