use crate::domain::{Series, SeriesTable};
use crate::numerics::mean;

/// Year-to-year sensitivity term `|x_t − x_{t−1}| / (x_t + x_{t−1})`.
/// Terms that are exactly zero or not finite are dropped.
fn sensitivity_term(previous: f64, current: f64) -> Option<f64> {
    let term = (current - previous).abs() / (current + previous);
    (term.is_finite() && term != 0.0).then_some(term)
}

/// Mean sensitivity over consecutive measured years from `start_year` on.
pub fn mean_sensitivity(series: &Series, start_year: Option<i32>) -> Option<f64> {
    let window = match start_year {
        Some(year) => series.restrict_from(year),
        None => series.clone(),
    };
    let terms: Vec<f64> = window
        .values()
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (Some(previous), Some(current)) => sensitivity_term(previous, current),
            _ => None,
        })
        .collect();
    mean(&terms)
}

/// Sensitivity of the group's mean chronology; trees are averaged first.
pub fn group_sensitivity<K>(group: &SeriesTable<K>, start_year: Option<i32>) -> Option<f64>
where
    K: Ord + Clone,
{
    mean_sensitivity(&group.mean_chronology().series, start_year)
}
