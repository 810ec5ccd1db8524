//! End-to-end batch run: read inputs once, derive every table in memory,
//! write the feature tables.

use crate::common::PipelineConfig;
use crate::domain::{DendroError, DendroResult, ExclusionLog, PipelineStage, Series};
use crate::io::writers::{
    biomass_table, exclusion_table, group_quality_table, growing_season_table, master_table,
    model_table, monthly_climate_table, tree_feature_table, tree_quality_table,
    wide_series_table,
};
use crate::io::{read_daily_climate, read_ring_records, read_sites};
use crate::modules::alignment::align_ring_records;
use crate::modules::biomass::{AllometryTable, RingGrid, reconstruct_biomass};
use crate::modules::climate::{ClimateReport, compute_climate};
use crate::modules::detrend::{DetrendConfig, DetrendForm, detrend_series, detrend_table};
use crate::modules::master::{MasterInputs, MasterReport, build_master_table};
use crate::modules::modeling::{
    FeatureRow, FeatureTable, ModelFitter, ModelSummary, OrdinaryLeastSquares,
};
use crate::modules::quality::filter_by_quality;
use crate::modules::serialization::{CsvTable, write_csv_artifact};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const RWI_FILE: &str = "rwi.csv";
pub const QUALITY_FILE: &str = "quality.csv";
pub const QUALITY_GROUPS_FILE: &str = "quality_groups.csv";
pub const CLIMATE_MONTHLY_FILE: &str = "climate_monthly.csv";
pub const GROWING_SEASON_FILE: &str = "growing_season.csv";
pub const BIOMASS_FILE: &str = "biomass.csv";
pub const TREE_FEATURES_FILE: &str = "tree_features.csv";
pub const MASTER_TABLE_FILE: &str = "master_table.csv";
pub const EXCLUSIONS_FILE: &str = "exclusions.csv";
pub const MODELS_FILE: &str = "models.csv";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineSummary {
    pub trees_aligned: usize,
    pub trees_retained: usize,
    pub groups: usize,
    pub groups_passed: usize,
    pub climate_months: usize,
    pub growing_seasons: usize,
    pub plot_rows: usize,
    pub tree_rows: usize,
    pub models: usize,
    pub exclusions: usize,
    pub artifacts: Vec<PathBuf>,
}

pub fn render_human_summary(summary: &PipelineSummary) -> String {
    let mut lines = vec![
        format!(
            "trees: {} aligned, {} retained",
            summary.trees_aligned, summary.trees_retained
        ),
        format!(
            "groups: {} screened, {} passed",
            summary.groups, summary.groups_passed
        ),
        format!(
            "climate: {} station-months, {} growing seasons",
            summary.climate_months, summary.growing_seasons
        ),
        format!(
            "feature rows: {} plots, {} trees",
            summary.plot_rows, summary.tree_rows
        ),
        format!("models fitted: {}", summary.models),
        format!("exclusions: {}", summary.exclusions),
    ];
    lines.extend(
        summary
            .artifacts
            .iter()
            .map(|path| format!("wrote {}", path.display())),
    );
    lines.join("\n")
}

pub fn run_pipeline(config: &PipelineConfig) -> DendroResult<PipelineSummary> {
    run_pipeline_with(config, &OrdinaryLeastSquares)
}

/// Runs every stage and writes all artifacts to `config.output_dir`.
///
/// Data-quality problems are logged as exclusions and never abort the run.
/// Unreadable inputs, invalid parameters and model-fit failures are errors.
pub fn run_pipeline_with(
    config: &PipelineConfig,
    fitter: &dyn ModelFitter,
) -> DendroResult<PipelineSummary> {
    let mut exclusions = ExclusionLog::default();

    tracing::info!(path = %config.rings_path.display(), "aligning ring records");
    let records = read_ring_records(&config.rings_path, &config.id_scheme)?;
    let alignment = align_ring_records(&records, &config.id_scheme);
    exclusions.extend(alignment.exclusions.clone());

    let catalog = read_sites(&config.sites_path)?;
    exclusions.extend(catalog.exclusions.clone());

    let daily = if config.climate_path.exists() {
        read_daily_climate(&config.climate_path)?
    } else {
        tracing::warn!(
            path = %config.climate_path.display(),
            "climate file not found, climate features will be empty"
        );
        Vec::new()
    };

    tracing::info!(trees = alignment.series.len(), "detrending ring widths");
    let detrended = detrend_table(&alignment.series, &config.detrend)?;
    exclusions.extend(detrended.exclusions.clone());

    tracing::info!("screening index correlations");
    let quality = filter_by_quality(&detrended.indices, &config.quality);
    exclusions.extend(quality.exclusions.clone());

    tracing::info!(days = daily.len(), "computing climate indices");
    let latitudes = catalog.station_latitudes();
    let climate = compute_climate(&daily, &latitudes, &config.climate);
    exclusions.extend(climate.exclusions.clone());
    let drivers = climate_drivers(config, &climate, latitudes.keys())?;

    tracing::info!("reconstructing biomass");
    let allometry = AllometryTable::builtin().with_entries(config.allometry.iter().cloned());
    let grid = RingGrid::from_table(&alignment.series)?;
    let biomass = reconstruct_biomass(&grid, &allometry);
    exclusions.extend(biomass.exclusions.clone());

    let master = build_master_table(&MasterInputs {
        widths: &alignment.series,
        indices: &quality.retained,
        quality: &quality,
        sites: &catalog.sites,
        climate: &climate,
        drivers: &drivers,
        biomass: &biomass,
        ecology: &config.ecology,
        recent_increment_years: config.recent_increment_years,
    });
    exclusions.extend(master.exclusions.clone());

    fs::create_dir_all(&config.output_dir).map_err(|error| {
        DendroError::io_system(
            "OUTPUT.DIR",
            format!(
                "failed to create output directory '{}': {error}",
                config.output_dir.display()
            ),
        )
    })?;

    let tables: Vec<(&str, CsvTable)> = vec![
        (RWI_FILE, wide_series_table(&detrended.indices)),
        (QUALITY_FILE, tree_quality_table(&quality.trees)),
        (QUALITY_GROUPS_FILE, group_quality_table(&quality.groups)),
        (CLIMATE_MONTHLY_FILE, monthly_climate_table(&climate.monthly)),
        (GROWING_SEASON_FILE, growing_season_table(&climate.seasons)),
        (BIOMASS_FILE, biomass_table(&biomass)),
        (TREE_FEATURES_FILE, tree_feature_table(&master.trees)),
        (MASTER_TABLE_FILE, master_table(&master.plots)),
        (EXCLUSIONS_FILE, exclusion_table(&exclusions)),
    ];
    let mut artifacts = write_tables(&config.output_dir, tables)?;

    let models = fit_models(config, &master, fitter)?;
    artifacts.extend(write_tables(
        &config.output_dir,
        vec![(MODELS_FILE, model_table(&models))],
    )?);

    let summary = PipelineSummary {
        trees_aligned: alignment.series.len(),
        trees_retained: quality.retained.len(),
        groups: quality.groups.len(),
        groups_passed: quality.groups.iter().filter(|group| group.passed).count(),
        climate_months: climate.monthly.len(),
        growing_seasons: climate.seasons.len(),
        plot_rows: master.plots.len(),
        tree_rows: master.trees.len(),
        models: models.len(),
        exclusions: exclusions.len(),
        artifacts,
    };
    tracing::info!(
        plots = summary.plot_rows,
        trees = summary.tree_rows,
        exclusions = summary.exclusions,
        "pipeline complete"
    );
    for stage in [
        PipelineStage::Alignment,
        PipelineStage::Quality,
        PipelineStage::Detrend,
        PipelineStage::Climate,
        PipelineStage::Season,
        PipelineStage::Biomass,
        PipelineStage::Master,
    ] {
        let count = exclusions.count_for(stage);
        if count > 0 {
            tracing::info!(%stage, count, "exclusions by stage");
        }
    }
    Ok(summary)
}

/// Annual driver series per station. With `detrend_driver` the series is
/// detrended in difference form with the ring-width spline settings.
fn climate_drivers<'a>(
    config: &PipelineConfig,
    climate: &ClimateReport,
    stations: impl Iterator<Item = &'a String>,
) -> DendroResult<BTreeMap<String, Series>> {
    let driver_config = DetrendConfig {
        form: DetrendForm::Difference,
        ..config.detrend
    };
    let mut drivers = BTreeMap::new();
    for station in stations {
        let series = climate.driver_series(station, config.ecology.driver);
        if series.is_empty() {
            continue;
        }
        let series = if config.detrend_driver {
            detrend_series(&series, &driver_config)?
        } else {
            series
        };
        drivers.insert(station.clone(), series);
    }
    Ok(drivers)
}

fn fit_models(
    config: &PipelineConfig,
    master: &MasterReport,
    fitter: &dyn ModelFitter,
) -> DendroResult<Vec<(FeatureTable, ModelSummary)>> {
    let plot_rows: Vec<FeatureRow> = master.plots.iter().map(|plot| plot.feature_row()).collect();
    let tree_rows: Vec<FeatureRow> = master.trees.iter().map(|tree| tree.feature_row()).collect();

    let mut models = Vec::with_capacity(config.models.len());
    for spec in &config.models {
        let rows = match spec.table {
            FeatureTable::Plot => &plot_rows,
            FeatureTable::Tree => &tree_rows,
        };
        let summary = fitter.fit(rows, spec)?;
        tracing::info!(
            table = spec.table.as_str(),
            response = %summary.response,
            observations = summary.observations,
            "fitted model"
        );
        models.push((spec.table, summary));
    }
    Ok(models)
}

fn write_tables(output_dir: &Path, tables: Vec<(&str, CsvTable)>) -> DendroResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(tables.len());
    for (file_name, table) in tables {
        let path = output_dir.join(file_name);
        write_csv_artifact(&path, &table)?;
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}
