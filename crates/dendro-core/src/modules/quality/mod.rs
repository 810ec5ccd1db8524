//! Inter-series correlation screening of plot chronologies.
//!
//! Input series are ring-width indices, so a shared age trend cannot inflate
//! the correlations. Every tree is compared with the mean chronology of the
//! *other* trees of its group. Retention uses these first-pass values; the
//! group `rbar` uses the same leave-one-out definition recomputed among the
//! retained trees, and both values are reported per tree.

use crate::common::constants::{
    CRITICAL_SERIES_CORRELATION, DEFAULT_MIN_OVERLAP_YEARS, DEFAULT_MIN_TREES_PER_GROUP,
};
use crate::domain::{ExclusionLog, PipelineStage, PlotKey, Series, SeriesTable, TreeKey};
use crate::numerics::{mean, pearson};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QualityConfig {
    pub critical_correlation: f64,
    pub min_overlap_years: usize,
    pub min_trees_per_group: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            critical_correlation: CRITICAL_SERIES_CORRELATION,
            min_overlap_years: DEFAULT_MIN_OVERLAP_YEARS,
            min_trees_per_group: DEFAULT_MIN_TREES_PER_GROUP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeQuality {
    pub key: TreeKey,
    /// Leave-one-out correlation against all trees of the group; decides
    /// retention.
    pub correlation: Option<f64>,
    /// Leave-one-out correlation recomputed among the retained trees only.
    /// These values make up the group `rbar`.
    pub retained_correlation: Option<f64>,
    pub overlap_years: usize,
    /// Whether the series passes into the filtered table.
    pub retained: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupQuality {
    pub key: PlotKey,
    pub trees: usize,
    pub retained_trees: usize,
    pub rbar: Option<f64>,
    pub rbar_pairwise: Option<f64>,
    pub eps: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityReport {
    pub trees: Vec<TreeQuality>,
    pub groups: Vec<GroupQuality>,
    pub retained: SeriesTable<TreeKey>,
    pub exclusions: ExclusionLog,
}

impl QualityReport {
    pub fn tree(&self, key: &TreeKey) -> Option<&TreeQuality> {
        self.trees.iter().find(|tree| &tree.key == key)
    }

    pub fn group(&self, key: &PlotKey) -> Option<&GroupQuality> {
        self.groups.iter().find(|group| &group.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaveOneOut {
    pub correlation: Option<f64>,
    pub overlap_years: usize,
}

/// Correlation of two series over the years both carry a value.
fn overlapping_correlation(lhs: &Series, rhs: &Series, min_overlap: usize) -> (Option<f64>, usize) {
    let (lhs_values, rhs_values): (Vec<f64>, Vec<f64>) = lhs
        .present()
        .filter_map(|(year, value)| rhs.get(year).map(|other| (value, other)))
        .unzip();
    let overlap = lhs_values.len();
    if overlap < min_overlap.max(2) {
        return (None, overlap);
    }
    (pearson(&lhs_values, &rhs_values), overlap)
}

/// Leave-one-out correlation of every series with the mean of the others.
pub fn leave_one_out_correlations<K>(
    group: &SeriesTable<K>,
    min_overlap: usize,
) -> BTreeMap<K, LeaveOneOut>
where
    K: Ord + Clone,
{
    group
        .keys()
        .map(|key| {
            let others = group.filter(|other, _| other != key);
            let reference = others.mean_chronology().series;
            let (correlation, overlap_years) = match group.get(key) {
                Some(series) if !others.is_empty() => {
                    overlapping_correlation(series, &reference, min_overlap)
                }
                _ => (None, 0),
            };
            (
                key.clone(),
                LeaveOneOut {
                    correlation,
                    overlap_years,
                },
            )
        })
        .collect()
}

/// Mean correlation over all unordered pairs with enough common years.
pub fn mean_pairwise_correlation<K>(group: &SeriesTable<K>, min_overlap: usize) -> Option<f64>
where
    K: Ord + Clone,
{
    let series: Vec<&Series> = group.iter().map(|(_, series)| series).collect();
    let mut correlations = Vec::new();
    for (index, lhs) in series.iter().enumerate() {
        for rhs in &series[index + 1..] {
            if let (Some(correlation), _) = overlapping_correlation(lhs, rhs, min_overlap) {
                correlations.push(correlation);
            }
        }
    }
    mean(&correlations)
}

/// `EPS = N·rbar / (1 + (N−1)·rbar)`; undefined below two series.
pub fn expressed_population_signal(series_count: usize, rbar: f64) -> Option<f64> {
    if series_count < 2 || !rbar.is_finite() {
        return None;
    }
    let n = series_count as f64;
    let denominator = 1.0 + (n - 1.0) * rbar;
    if denominator <= 0.0 {
        return None;
    }
    Some(n * rbar / denominator)
}

pub fn filter_by_quality(table: &SeriesTable<TreeKey>, config: &QualityConfig) -> QualityReport {
    let mut report = QualityReport::default();

    for (plot, group) in table.group_by(TreeKey::plot_key) {
        let screening = leave_one_out_correlations(&group, config.min_overlap_years);

        let mut passing = Vec::new();
        for (key, result) in &screening {
            match result.correlation {
                Some(correlation) if correlation >= config.critical_correlation => {
                    passing.push(key.clone());
                }
                Some(correlation) => report.exclusions.record(
                    PipelineStage::Quality,
                    key.to_string(),
                    format!(
                        "leave-one-out correlation {correlation:.4} below {:.4}",
                        config.critical_correlation
                    ),
                ),
                None => report.exclusions.record(
                    PipelineStage::Quality,
                    key.to_string(),
                    format!(
                        "correlation undefined ({} overlapping years with the group)",
                        result.overlap_years
                    ),
                ),
            }
        }

        let retained_group = group.filter(|key, _| passing.contains(key));
        let recomputed = leave_one_out_correlations(&retained_group, config.min_overlap_years);
        let retained_correlations: Vec<f64> = recomputed
            .values()
            .filter_map(|result| result.correlation)
            .collect();

        let retained_trees = retained_group.len();
        let rbar = if retained_trees >= 2 {
            mean(&retained_correlations)
        } else {
            None
        };
        let rbar_pairwise = if retained_trees >= 2 {
            mean_pairwise_correlation(&retained_group, config.min_overlap_years)
        } else {
            None
        };
        let eps = rbar.and_then(|rbar| expressed_population_signal(retained_trees, rbar));
        let passed = retained_trees >= config.min_trees_per_group.max(1);

        if !passed {
            report.exclusions.record(
                PipelineStage::Quality,
                plot.to_string(),
                format!(
                    "{retained_trees} retained trees, at least {} required",
                    config.min_trees_per_group
                ),
            );
        }

        tracing::debug!(
            plot = %plot,
            trees = group.len(),
            retained = retained_trees,
            ?rbar,
            ?eps,
            "screened plot chronology"
        );

        for (key, result) in screening {
            let retained = passed && passing.contains(&key);
            if retained {
                if let Some(series) = group.get(&key) {
                    report.retained.insert(key.clone(), series.clone());
                }
            }
            let retained_correlation = if retained {
                recomputed.get(&key).and_then(|result| result.correlation)
            } else {
                None
            };
            report.trees.push(TreeQuality {
                key,
                correlation: result.correlation,
                retained_correlation,
                overlap_years: result.overlap_years,
                retained,
            });
        }

        report.groups.push(GroupQuality {
            key: plot,
            trees: group.len(),
            retained_trees,
            rbar,
            rbar_pairwise,
            eps,
            passed,
        });
    }

    tracing::info!(
        trees = report.trees.len(),
        retained = report.retained.len(),
        groups = report.groups.len(),
        "quality filter complete"
    );
    report
}
