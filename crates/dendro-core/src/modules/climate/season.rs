use crate::common::constants::{
    SEASON_DEGENERATE_LENGTH_DAYS, SEASON_END_EARLIEST_DOY, SEASON_END_LATEST_DOY,
    SEASON_LEAD_DAYS, SEASON_RUN_DAYS, SEASON_START_EARLIEST_DOY, SEASON_THRESHOLD_C,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeasonConfig {
    pub threshold_c: f64,
    pub run_days: u32,
    pub start_earliest_doy: u32,
    pub end_earliest_doy: u32,
    pub end_latest_doy: u32,
    pub degenerate_length_days: u32,
    pub lead_days: u32,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            threshold_c: SEASON_THRESHOLD_C,
            run_days: SEASON_RUN_DAYS,
            start_earliest_doy: SEASON_START_EARLIEST_DOY,
            end_earliest_doy: SEASON_END_EARLIEST_DOY,
            end_latest_doy: SEASON_END_LATEST_DOY,
            degenerate_length_days: SEASON_DEGENERATE_LENGTH_DAYS,
            lead_days: SEASON_LEAD_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonWindow {
    pub start_doy: u32,
    pub end_doy: u32,
    pub length_days: u32,
}

impl SeasonWindow {
    /// Days averaged for within-season summaries, including the lead-in.
    pub fn summary_days(&self, lead_days: u32) -> std::ops::RangeInclusive<u32> {
        self.start_doy.saturating_sub(lead_days).max(1)..=self.end_doy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeasonGap {
    #[error("no warm run starts on or after day {earliest}")]
    NoStart { earliest: u32 },
    #[error("no warm run ends between day {earliest} and day {latest}")]
    NoEnd { earliest: u32, latest: u32 },
    #[error("season end {end} precedes start {start}")]
    Inverted { start: u32, end: u32 },
    #[error("season length {length} days is degenerate")]
    Degenerate { length: u32 },
}

/// Locates the growing season in one year of daily mean temperatures keyed
/// by day of year. A missing day breaks any run it falls in.
pub fn detect_growing_season(
    daily_mean: &BTreeMap<u32, f64>,
    config: &SeasonConfig,
) -> Result<SeasonWindow, SeasonGap> {
    let run = config.run_days.max(1);
    let warm = |day: u32| {
        daily_mean
            .get(&day)
            .is_some_and(|temperature| *temperature > config.threshold_c)
    };
    let last_day = daily_mean.keys().next_back().copied().unwrap_or(0);

    let start_doy = (config.start_earliest_doy..=last_day)
        .find(|day| (*day..day + run).all(warm))
        .ok_or(SeasonGap::NoStart {
            earliest: config.start_earliest_doy,
        })?;

    let end_doy = (config.end_earliest_doy.max(run)..=config.end_latest_doy)
        .rev()
        .find(|day| (day + 1 - run..=*day).all(warm))
        .ok_or(SeasonGap::NoEnd {
            earliest: config.end_earliest_doy,
            latest: config.end_latest_doy,
        })?;

    if end_doy < start_doy {
        return Err(SeasonGap::Inverted {
            start: start_doy,
            end: end_doy,
        });
    }

    let length_days = run + (end_doy - start_doy);
    if length_days >= config.degenerate_length_days {
        return Err(SeasonGap::Degenerate {
            length: length_days,
        });
    }

    Ok(SeasonWindow {
        start_doy,
        end_doy,
        length_days,
    })
}
