use crate::domain::Series;
use crate::numerics::{deterministic_argsort, fit_simple_linear, mean};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Slack on `fraction·n` so that e.g. `0.1·30` does not round up to 4.
const TAIL_SIZE_SLACK: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtremeTail {
    #[default]
    Low,
    High,
}

/// `k = ceil(fraction·n)`, never more than `n`.
pub fn tail_size(fraction: f64, count: usize) -> usize {
    if count == 0 || !(fraction > 0.0) {
        return 0;
    }
    let k = (fraction * count as f64 - TAIL_SIZE_SLACK).ceil();
    (k.max(1.0) as usize).min(count)
}

/// Years in the requested tail. Ties resolve by year order.
pub fn extreme_years(pairs: &[(i32, f64)], fraction: f64, tail: ExtremeTail) -> BTreeSet<i32> {
    let k = tail_size(fraction, pairs.len());
    let values: Vec<f64> = pairs.iter().map(|(_, value)| *value).collect();
    let order = deterministic_argsort(&values);
    let picked: Vec<usize> = match tail {
        ExtremeTail::Low => order.into_iter().take(k).collect(),
        ExtremeTail::High => order.into_iter().rev().take(k).collect(),
    };
    picked.into_iter().map(|index| pairs[index].0).collect()
}

fn common_years(lhs: &Series, rhs: &Series) -> Vec<(i32, f64, f64)> {
    lhs.present()
        .filter_map(|(year, left)| rhs.get(year).map(|right| (year, left, right)))
        .collect()
}

/// Share of the lowest-growth years that coincide with climate extremes in
/// `climate_tail`, over the years both series cover.
pub fn coincidence_rate(
    growth: &Series,
    climate: &Series,
    fraction: f64,
    climate_tail: ExtremeTail,
) -> Option<f64> {
    let common = common_years(growth, climate);
    let k = tail_size(fraction, common.len());
    if k == 0 {
        return None;
    }

    let growth_pairs: Vec<(i32, f64)> = common.iter().map(|(year, g, _)| (*year, *g)).collect();
    let climate_pairs: Vec<(i32, f64)> = common.iter().map(|(year, _, c)| (*year, *c)).collect();
    let growth_extremes = extreme_years(&growth_pairs, fraction, ExtremeTail::Low);
    let climate_extremes = extreme_years(&climate_pairs, fraction, climate_tail);

    let shared = growth_extremes.intersection(&climate_extremes).count();
    Some(shared as f64 / k as f64)
}

/// Predicted over observed growth in climate-extreme years.
///
/// Growth is regressed on the driver over the non-extreme years; the fit is
/// evaluated at the mean driver of the extreme years and divided by the mean
/// observed growth of those years.
pub fn extreme_ratio(
    growth: &Series,
    driver: &Series,
    fraction: f64,
    driver_tail: ExtremeTail,
) -> Option<f64> {
    let common = common_years(growth, driver);
    let driver_pairs: Vec<(i32, f64)> = common.iter().map(|(year, _, d)| (*year, *d)).collect();
    let extremes = extreme_years(&driver_pairs, fraction, driver_tail);
    if extremes.is_empty() {
        return None;
    }

    let (normal, extreme): (Vec<_>, Vec<_>) = common
        .iter()
        .partition(|(year, _, _)| !extremes.contains(year));
    let normal_driver: Vec<f64> = normal.iter().map(|(_, _, d)| *d).collect();
    let normal_growth: Vec<f64> = normal.iter().map(|(_, g, _)| *g).collect();
    let fit = fit_simple_linear(&normal_driver, &normal_growth)?;

    let extreme_driver: Vec<f64> = extreme.iter().map(|(_, _, d)| *d).collect();
    let extreme_growth: Vec<f64> = extreme.iter().map(|(_, g, _)| *g).collect();
    let predicted = fit.predict(mean(&extreme_driver)?);
    let observed = mean(&extreme_growth)?;
    if observed == 0.0 {
        return None;
    }

    let ratio = predicted / observed;
    ratio.is_finite().then_some(ratio)
}
