use super::CliError;
use super::helpers::{compute_error, ensure_dir, ensure_parent_dir};
use dendro_core::common::constants::{DEFAULT_SPEI_SCALE_MONTHS, DEFAULT_SPLINE_RIGIDITY_YEARS};
use dendro_core::common::load_pipeline_config;
use dendro_core::io::writers::{
    exclusion_table, growing_season_table, monthly_climate_table, wide_series_table,
};
use dendro_core::io::{read_daily_climate, read_wide_series};
use dendro_core::modules::climate::{ClimateConfig, compute_climate};
use dendro_core::modules::detrend::{DetrendConfig, DetrendForm, detrend_table};
use dendro_core::modules::serialization::write_csv_artifact;
use dendro_core::pipeline::{
    CLIMATE_MONTHLY_FILE, EXCLUSIONS_FILE, GROWING_SEASON_FILE, render_human_summary,
    run_pipeline,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Pipeline configuration (JSON); relative paths inside resolve against its directory
    #[arg(long, default_value = "pipeline.json")]
    config: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct DetrendArgs {
    /// Wide CSV with a `year` column and one column per series
    #[arg(long)]
    input: PathBuf,

    /// Output CSV of indices in the same layout
    #[arg(long)]
    output: PathBuf,

    /// Spline rigidity in years (50% frequency-response cutoff)
    #[arg(long, default_value_t = DEFAULT_SPLINE_RIGIDITY_YEARS)]
    rigidity: f64,

    /// Index form: ratio or difference
    #[arg(long, default_value_t = DetrendForm::Ratio)]
    form: DetrendForm,

    /// Minimum measured years per series
    #[arg(long)]
    min_points: Option<usize>,
}

#[derive(clap::Args)]
pub(super) struct ClimateArgs {
    /// Daily climate CSV (station, date, t_mean, t_min, t_max, precip_mm, rh_percent)
    #[arg(long)]
    input: PathBuf,

    /// Latitude in degrees applied to every station in the input
    #[arg(long, allow_negative_numbers = true)]
    latitude: f64,

    /// Directory receiving climate_monthly.csv and growing_season.csv
    #[arg(long, default_value = "climate")]
    output_dir: PathBuf,

    /// SPEI accumulation window in months
    #[arg(long, default_value_t = DEFAULT_SPEI_SCALE_MONTHS)]
    spei_scale: usize,
}

pub(super) fn run_pipeline_command(args: RunArgs) -> Result<i32, CliError> {
    let config = load_pipeline_config(&args.config).map_err(compute_error)?;
    tracing::debug!(
        config = %args.config.display(),
        output_dir = %config.output_dir.display(),
        "loaded pipeline configuration"
    );
    let summary = run_pipeline(&config).map_err(CliError::Compute)?;
    println!("{}", render_human_summary(&summary));
    Ok(0)
}

pub(super) fn run_detrend_command(args: DetrendArgs) -> Result<i32, CliError> {
    let defaults = DetrendConfig::default();
    let config = DetrendConfig {
        rigidity_years: args.rigidity,
        form: args.form,
        min_points: args.min_points.unwrap_or(defaults.min_points),
        ..defaults
    };

    let table = read_wide_series(&args.input).map_err(compute_error)?;
    let report = detrend_table(&table, &config).map_err(compute_error)?;

    ensure_parent_dir(&args.output)?;
    write_csv_artifact(&args.output, &wide_series_table(&report.indices))
        .map_err(compute_error)?;

    println!(
        "detrended {} series ({} excluded) -> {}",
        report.indices.len(),
        report.exclusions.len(),
        args.output.display()
    );
    Ok(0)
}

pub(super) fn run_climate_command(args: ClimateArgs) -> Result<i32, CliError> {
    let days = read_daily_climate(&args.input).map_err(compute_error)?;
    let latitudes: BTreeMap<String, f64> = days
        .iter()
        .map(|day| (day.station.clone(), args.latitude))
        .collect();
    let config = ClimateConfig {
        spei_scale_months: args.spei_scale,
        ..ClimateConfig::default()
    };
    let report = compute_climate(&days, &latitudes, &config);

    ensure_dir(&args.output_dir)?;
    let outputs = [
        (CLIMATE_MONTHLY_FILE, monthly_climate_table(&report.monthly)),
        (GROWING_SEASON_FILE, growing_season_table(&report.seasons)),
        (EXCLUSIONS_FILE, exclusion_table(&report.exclusions)),
    ];
    for (file_name, table) in &outputs {
        write_csv_artifact(&args.output_dir.join(file_name), table).map_err(compute_error)?;
    }

    println!(
        "{} station-months, {} growing seasons -> {}",
        report.monthly.len(),
        report.seasons.len(),
        args.output_dir.display()
    );
    Ok(0)
}
