//! Renders pipeline results as CSV tables. Rows follow key order, so equal
//! inputs always produce byte-identical files.

use crate::domain::{ExclusionLog, SeriesTable, TreeKey};
use crate::modules::biomass::BiomassReport;
use crate::modules::climate::{GrowingSeason, MonthlyClimate};
use crate::modules::master::{
    PLOT_NUMERIC_COLUMNS, PlotFeatures, TREE_NUMERIC_COLUMNS, TreeFeatures,
};
use crate::modules::modeling::{FeatureRow, FeatureTable, ModelSummary};
use crate::modules::quality::{GroupQuality, TreeQuality};
use crate::modules::serialization::{
    CsvTable, VALUE_PRECISION, format_optional, format_optional_int,
};

fn value(value: Option<f64>) -> String {
    format_optional(value, VALUE_PRECISION)
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Feature columns holding years or counts, rendered without decimals.
const INTEGER_COLUMNS: [&str; 6] = [
    "clearcut_year",
    "trees",
    "retained_trees",
    "first_year",
    "last_year",
    "disturbance_year",
];

fn numeric_cells(row: &FeatureRow, columns: &[&str]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            let cell = row.get(*column).copied().flatten();
            if INTEGER_COLUMNS.contains(column) {
                format_optional_int(cell.map(|number| number.round() as i64))
            } else {
                value(cell)
            }
        })
        .collect()
}

fn key_cells(key: &TreeKey) -> Vec<String> {
    vec![
        key.species.clone(),
        key.forest.clone(),
        key.site.clone(),
        key.plot.clone(),
        key.tree.clone(),
    ]
}

/// One `year` column followed by one column per series.
pub fn wide_series_table<K>(table: &SeriesTable<K>) -> CsvTable
where
    K: Ord + Clone + ToString,
{
    let mut csv = CsvTable::new(
        std::iter::once("year".to_string()).chain(table.keys().map(ToString::to_string)),
    );
    let Some((first, last)) = table.year_span() else {
        return csv;
    };
    for year in first..=last {
        let mut row = vec![year.to_string()];
        row.extend(table.iter().map(|(_, series)| value(series.get(year))));
        csv.push_row(row);
    }
    csv
}

pub fn tree_quality_table(trees: &[TreeQuality]) -> CsvTable {
    let mut csv = CsvTable::new([
        "species",
        "forest",
        "site",
        "plot",
        "tree",
        "correlation",
        "retained_correlation",
        "overlap_years",
        "retained",
    ]);
    for tree in trees {
        let mut row = key_cells(&tree.key);
        row.extend([
            value(tree.correlation),
            value(tree.retained_correlation),
            tree.overlap_years.to_string(),
            flag(tree.retained),
        ]);
        csv.push_row(row);
    }
    csv
}

pub fn group_quality_table(groups: &[GroupQuality]) -> CsvTable {
    let mut csv = CsvTable::new([
        "species",
        "forest",
        "site",
        "plot",
        "trees",
        "retained_trees",
        "rbar",
        "rbar_pairwise",
        "eps",
        "passed",
    ]);
    for group in groups {
        csv.push_row(vec![
            group.key.species.clone(),
            group.key.forest.clone(),
            group.key.site.clone(),
            group.key.plot.clone(),
            group.trees.to_string(),
            group.retained_trees.to_string(),
            value(group.rbar),
            value(group.rbar_pairwise),
            value(group.eps),
            flag(group.passed),
        ]);
    }
    csv
}

pub fn monthly_climate_table(monthly: &[MonthlyClimate]) -> CsvTable {
    let mut csv = CsvTable::new([
        "station",
        "year",
        "month",
        "observed_days",
        "t_mean",
        "t_min",
        "t_max",
        "precip_mm",
        "vpd_kpa",
        "vpd_max_kpa",
        "pet_mm",
        "water_balance_mm",
        "spei",
    ]);
    for month in monthly {
        csv.push_row(vec![
            month.station.clone(),
            month.year.to_string(),
            month.month.to_string(),
            month.observed_days.to_string(),
            value(month.t_mean),
            value(month.t_min),
            value(month.t_max),
            value(month.precip_mm),
            value(month.vpd_kpa),
            value(month.vpd_max_kpa),
            value(month.pet_mm),
            value(month.water_balance_mm),
            value(month.spei),
        ]);
    }
    csv
}

pub fn growing_season_table(seasons: &[GrowingSeason]) -> CsvTable {
    let mut csv = CsvTable::new([
        "station",
        "year",
        "start_doy",
        "end_doy",
        "length_days",
        "mean_temperature",
        "mean_precip_mm",
        "mean_vpd_kpa",
        "mean_spei",
    ]);
    for season in seasons {
        csv.push_row(vec![
            season.station.clone(),
            season.year.to_string(),
            season.window.start_doy.to_string(),
            season.window.end_doy.to_string(),
            season.window.length_days.to_string(),
            value(season.mean_temperature),
            value(season.mean_precip_mm),
            value(season.mean_vpd_kpa),
            value(season.mean_spei),
        ]);
    }
    csv
}

/// Long format, one row per tree and measured year.
pub fn biomass_table(report: &BiomassReport) -> CsvTable {
    let mut csv = CsvTable::new([
        "species",
        "forest",
        "site",
        "plot",
        "tree",
        "year",
        "diameter_mm",
        "biomass_kg",
        "increment_kg",
    ]);
    for (key, tree) in &report.trees {
        for (year, diameter) in tree.diameter_mm.present() {
            let mut row = key_cells(key);
            row.extend([
                year.to_string(),
                value(Some(diameter)),
                value(tree.biomass_kg.get(year)),
                value(tree.increment_kg.get(year)),
            ]);
            csv.push_row(row);
        }
    }
    csv
}

pub fn tree_feature_table(trees: &[TreeFeatures]) -> CsvTable {
    let mut csv = CsvTable::new(
        ["species", "forest", "site", "plot", "tree", "retained"]
            .into_iter()
            .chain(TREE_NUMERIC_COLUMNS),
    );
    for tree in trees {
        let mut row = key_cells(&tree.key);
        row.push(flag(tree.retained));
        row.extend(numeric_cells(&tree.feature_row(), &TREE_NUMERIC_COLUMNS));
        csv.push_row(row);
    }
    csv
}

pub fn master_table(plots: &[PlotFeatures]) -> CsvTable {
    let mut csv = CsvTable::new(
        ["species", "forest", "site", "plot", "station", "soil_moisture"]
            .into_iter()
            .chain(PLOT_NUMERIC_COLUMNS),
    );
    for plot in plots {
        let mut row = vec![
            plot.key.species.clone(),
            plot.key.forest.clone(),
            plot.key.site.clone(),
            plot.key.plot.clone(),
            plot.site.station.clone(),
            plot.site.soil_moisture.clone().unwrap_or_default(),
        ];
        row.extend(numeric_cells(&plot.feature_row(), &PLOT_NUMERIC_COLUMNS));
        csv.push_row(row);
    }
    csv
}

pub fn exclusion_table(exclusions: &ExclusionLog) -> CsvTable {
    let mut csv = CsvTable::new(["stage", "entity", "reason"]);
    for exclusion in exclusions.entries() {
        csv.push_row(vec![
            exclusion.stage.to_string(),
            exclusion.entity.clone(),
            exclusion.reason.clone(),
        ]);
    }
    csv
}

/// One row per fitted coefficient.
pub fn model_table(models: &[(FeatureTable, ModelSummary)]) -> CsvTable {
    let mut csv = CsvTable::new([
        "table",
        "response",
        "term",
        "estimate",
        "observations",
        "dropped_rows",
        "r_squared",
    ]);
    for (table, summary) in models {
        for (term, estimate) in &summary.coefficients {
            csv.push_row(vec![
                table.as_str().to_string(),
                summary.response.clone(),
                term.clone(),
                value(Some(*estimate)),
                summary.observations.to_string(),
                summary.dropped_rows.to_string(),
                value(summary.r_squared),
            ]);
        }
    }
    csv
}
