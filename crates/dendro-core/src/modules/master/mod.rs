//! Per-plot master table and per-tree feature table.

use crate::domain::{
    ExclusionLog, PipelineStage, PlotKey, Series, SeriesTable, SiteAttributes, SiteKey, TreeKey,
};
use crate::modules::biomass::BiomassReport;
use crate::modules::climate::{ClimateReport, GrowingSeason};
use crate::modules::ecology::{
    EcologyConfig, ResilienceComponents, coincidence_rate, extreme_ratio, group_sensitivity,
    mean_sensitivity, resilience_components,
};
use crate::modules::modeling::FeatureRow;
use crate::modules::quality::{GroupQuality, QualityReport};
use crate::numerics::mean;
use std::collections::BTreeMap;

pub const TREE_NUMERIC_COLUMNS: [&str; 15] = [
    "correlation",
    "first_year",
    "last_year",
    "sensitivity_raw",
    "sensitivity_rwi",
    "disturbance_year",
    "resistance_raw",
    "recovery_raw",
    "resilience_raw",
    "resistance_rwi",
    "recovery_rwi",
    "resilience_rwi",
    "diameter_mm",
    "biomass_kg",
    "recent_increment_kg",
];

pub const PLOT_NUMERIC_COLUMNS: [&str; 29] = [
    "latitude",
    "altitude_m",
    "soil_cn_ratio",
    "clearcut_year",
    "conifer_share",
    "trees",
    "retained_trees",
    "rbar",
    "rbar_pairwise",
    "eps",
    "first_year",
    "last_year",
    "sensitivity_raw",
    "sensitivity_rwi",
    "disturbance_year",
    "resistance_raw",
    "recovery_raw",
    "resilience_raw",
    "resistance_rwi",
    "recovery_rwi",
    "resilience_rwi",
    "coincidence_rate",
    "extreme_ratio",
    "season_length_days",
    "season_temperature",
    "season_precip_mm",
    "season_vpd_kpa",
    "season_spei",
    "mean_biomass_kg",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TreeFeatures {
    pub key: TreeKey,
    pub retained: bool,
    pub correlation: Option<f64>,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub sensitivity_raw: Option<f64>,
    pub sensitivity_rwi: Option<f64>,
    pub disturbance_year: Option<i32>,
    pub resilience_raw: ResilienceComponents,
    pub resilience_rwi: ResilienceComponents,
    pub diameter_mm: Option<f64>,
    pub biomass_kg: Option<f64>,
    pub recent_increment_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotFeatures {
    pub key: PlotKey,
    pub site: SiteAttributes,
    pub quality: GroupQuality,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub sensitivity_raw: Option<f64>,
    pub sensitivity_rwi: Option<f64>,
    pub disturbance_year: Option<i32>,
    pub resilience_raw: ResilienceComponents,
    pub resilience_rwi: ResilienceComponents,
    pub coincidence_rate: Option<f64>,
    pub extreme_ratio: Option<f64>,
    pub season_length_days: Option<f64>,
    pub season_temperature: Option<f64>,
    pub season_precip_mm: Option<f64>,
    pub season_vpd_kpa: Option<f64>,
    pub season_spei: Option<f64>,
    pub mean_biomass_kg: Option<f64>,
}

fn year_value(year: Option<i32>) -> Option<f64> {
    year.map(f64::from)
}

fn resilience_values(components: &ResilienceComponents) -> [Option<f64>; 3] {
    [
        components.resistance,
        components.recovery,
        components.resilience,
    ]
}

fn named_row(columns: &[&str], values: Vec<Option<f64>>) -> FeatureRow {
    columns
        .iter()
        .map(|column| column.to_string())
        .zip(values)
        .collect()
}

impl TreeFeatures {
    pub fn feature_row(&self) -> FeatureRow {
        let mut values = vec![
            self.correlation,
            year_value(self.first_year),
            year_value(self.last_year),
            self.sensitivity_raw,
            self.sensitivity_rwi,
            year_value(self.disturbance_year),
        ];
        values.extend(resilience_values(&self.resilience_raw));
        values.extend(resilience_values(&self.resilience_rwi));
        values.extend([self.diameter_mm, self.biomass_kg, self.recent_increment_kg]);
        named_row(&TREE_NUMERIC_COLUMNS, values)
    }
}

impl PlotFeatures {
    pub fn feature_row(&self) -> FeatureRow {
        let mut values = vec![
            Some(self.site.latitude),
            self.site.altitude_m,
            self.site.soil_cn_ratio,
            year_value(self.site.clearcut_year),
            self.site.conifer_share,
            Some(self.quality.trees as f64),
            Some(self.quality.retained_trees as f64),
            self.quality.rbar,
            self.quality.rbar_pairwise,
            self.quality.eps,
            year_value(self.first_year),
            year_value(self.last_year),
            self.sensitivity_raw,
            self.sensitivity_rwi,
            year_value(self.disturbance_year),
        ];
        values.extend(resilience_values(&self.resilience_raw));
        values.extend(resilience_values(&self.resilience_rwi));
        values.extend([
            self.coincidence_rate,
            self.extreme_ratio,
            self.season_length_days,
            self.season_temperature,
            self.season_precip_mm,
            self.season_vpd_kpa,
            self.season_spei,
            self.mean_biomass_kg,
        ]);
        named_row(&PLOT_NUMERIC_COLUMNS, values)
    }
}

pub struct MasterInputs<'a> {
    /// Aligned ring widths of every tree.
    pub widths: &'a SeriesTable<TreeKey>,
    /// Detrended indices of the retained trees.
    pub indices: &'a SeriesTable<TreeKey>,
    pub quality: &'a QualityReport,
    pub sites: &'a BTreeMap<SiteKey, SiteAttributes>,
    pub climate: &'a ClimateReport,
    /// Annual climate driver per station, already detrended when requested.
    pub drivers: &'a BTreeMap<String, Series>,
    pub biomass: &'a BiomassReport,
    pub ecology: &'a EcologyConfig,
    pub recent_increment_years: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterReport {
    pub plots: Vec<PlotFeatures>,
    pub trees: Vec<TreeFeatures>,
    pub exclusions: ExclusionLog,
}

fn season_mean(
    seasons: &[&GrowingSeason],
    field: impl Fn(&GrowingSeason) -> Option<f64>,
) -> Option<f64> {
    let values: Vec<f64> = seasons.iter().filter_map(|season| field(*season)).collect();
    mean(&values)
}

fn disturbance_components(
    series: &Series,
    disturbance_year: Option<i32>,
    ecology: &EcologyConfig,
) -> ResilienceComponents {
    disturbance_year
        .map(|year| {
            resilience_components(
                series,
                year,
                ecology.pre_window_years,
                ecology.post_window_years,
            )
        })
        .unwrap_or_default()
}

fn tree_features(
    key: &TreeKey,
    site: &SiteAttributes,
    inputs: &MasterInputs<'_>,
) -> Option<TreeFeatures> {
    let widths = inputs.widths.get(key)?;
    let quality = inputs.quality.tree(key);
    let index = inputs.indices.get(key);
    let ecology = inputs.ecology;
    let disturbance_year = ecology.disturbance_for(site.clearcut_year);
    let biomass = inputs.biomass.trees.get(key);
    let range = widths.valid_range();

    Some(TreeFeatures {
        key: key.clone(),
        retained: quality.is_some_and(|tree| tree.retained),
        correlation: quality.and_then(|tree| tree.correlation),
        first_year: range.map(|(first, _)| first),
        last_year: range.map(|(_, last)| last),
        sensitivity_raw: mean_sensitivity(widths, ecology.sensitivity_start_year),
        sensitivity_rwi: index
            .and_then(|series| mean_sensitivity(series, ecology.sensitivity_start_year)),
        disturbance_year,
        resilience_raw: disturbance_components(widths, disturbance_year, ecology),
        resilience_rwi: index
            .map(|series| disturbance_components(series, disturbance_year, ecology))
            .unwrap_or_default(),
        diameter_mm: biomass.and_then(|tree| tree.total_diameter_mm()),
        biomass_kg: biomass.and_then(|tree| tree.total_biomass_kg()),
        recent_increment_kg: biomass
            .and_then(|tree| tree.recent_mean_increment(inputs.recent_increment_years)),
    })
}

fn plot_features(
    group: &GroupQuality,
    site: &SiteAttributes,
    inputs: &MasterInputs<'_>,
) -> PlotFeatures {
    let ecology = inputs.ecology;
    let raw = inputs
        .widths
        .filter(|key, _| key.plot_key() == group.key && inputs.indices.contains_key(key));
    let detrended = inputs.indices.filter(|key, _| key.plot_key() == group.key);
    let raw_chronology = raw.mean_chronology().series;
    let rwi_chronology = detrended.mean_chronology().series;
    let disturbance_year = ecology.disturbance_for(site.clearcut_year);

    let (coincidence, ratio) = match inputs.drivers.get(&site.station) {
        Some(driver) => (
            coincidence_rate(
                &rwi_chronology,
                driver,
                ecology.extreme_fraction,
                ecology.climate_tail,
            ),
            extreme_ratio(
                &rwi_chronology,
                driver,
                ecology.extreme_fraction,
                ecology.climate_tail,
            ),
        ),
        None => (None, None),
    };

    let seasons: Vec<&GrowingSeason> = inputs.climate.seasons_for(&site.station).collect();
    let biomass: Vec<f64> = inputs
        .biomass
        .trees
        .iter()
        .filter(|(key, _)| key.plot_key() == group.key && inputs.indices.contains_key(key))
        .filter_map(|(_, tree)| tree.total_biomass_kg())
        .collect();
    let range = rwi_chronology.valid_range();

    PlotFeatures {
        key: group.key.clone(),
        site: site.clone(),
        quality: group.clone(),
        first_year: range.map(|(first, _)| first),
        last_year: range.map(|(_, last)| last),
        sensitivity_raw: group_sensitivity(&raw, ecology.sensitivity_start_year),
        sensitivity_rwi: group_sensitivity(&detrended, ecology.sensitivity_start_year),
        disturbance_year,
        resilience_raw: disturbance_components(&raw_chronology, disturbance_year, ecology),
        resilience_rwi: disturbance_components(&rwi_chronology, disturbance_year, ecology),
        coincidence_rate: coincidence,
        extreme_ratio: ratio,
        season_length_days: season_mean(&seasons, |season| {
            Some(f64::from(season.window.length_days))
        }),
        season_temperature: season_mean(&seasons, |season| season.mean_temperature),
        season_precip_mm: season_mean(&seasons, |season| season.mean_precip_mm),
        season_vpd_kpa: season_mean(&seasons, |season| season.mean_vpd_kpa),
        season_spei: season_mean(&seasons, |season| season.mean_spei),
        mean_biomass_kg: mean(&biomass),
    }
}

/// Joins quality, ecology, climate and biomass results on plot and tree
/// keys. Plots whose site attributes are unknown are excluded and logged.
pub fn build_master_table(inputs: &MasterInputs<'_>) -> MasterReport {
    let mut report = MasterReport::default();

    for group in &inputs.quality.groups {
        let Some(site) = inputs.sites.get(&group.key.site_key()) else {
            report.exclusions.record(
                PipelineStage::Master,
                group.key.to_string(),
                format!("no site attributes for {}", group.key.site_key()),
            );
            continue;
        };

        let trees: Vec<&TreeKey> = inputs
            .widths
            .keys()
            .filter(|key| key.plot_key() == group.key)
            .collect();
        for key in trees {
            if let Some(features) = tree_features(key, site, inputs) {
                report.trees.push(features);
            }
        }

        if group.passed {
            report.plots.push(plot_features(group, site, inputs));
        }
    }

    tracing::info!(
        plots = report.plots.len(),
        trees = report.trees.len(),
        "assembled master table"
    );
    report
}
