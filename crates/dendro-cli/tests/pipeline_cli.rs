use chrono::{Datelike, NaiveDate};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const ARTIFACTS: [&str; 10] = [
    "rwi.csv",
    "quality.csv",
    "quality_groups.csv",
    "climate_monthly.csv",
    "growing_season.csv",
    "biomass.csv",
    "tree_features.csv",
    "master_table.csv",
    "exclusions.csv",
    "models.csv",
];

fn run_dendro(args: &[&str]) -> Output {
    let binary_path = env!("CARGO_BIN_EXE_dendro");
    Command::new(binary_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("dendro binary should launch")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("fixture should be written");
}

fn ring_width(tree: u32, age: u32) -> f64 {
    let t = f64::from(age);
    let common = 0.35 * (t * 0.9).sin() + 0.2 * (t * 2.3).cos();
    let own = 0.05 * (t * 0.41 + f64::from(tree)).sin();
    0.7 + 2.4 * (-t / 22.0).exp() + common + own
}

fn rings_csv() -> String {
    let mut rings = String::from("raw_id,measured_year,year,width_mm\n");
    for plot in 1..=2_u32 {
        for tree in 1..=5_u32 {
            for (age, year) in (1971..=2010).enumerate() {
                let width = ring_width(plot * 10 + tree, age as u32);
                writeln!(rings, "ps_cc_01_{plot}_{tree},2011,{year},{width:.3}")
                    .expect("string write");
            }
        }
    }
    // An earlier campaign of tree 1 and a row whose identifier cannot be parsed.
    rings.push_str("PS_CC_1_1_1,2001,1990,9.999\n");
    rings.push_str("broken,2011,2000,1.0\n");
    rings
}

fn sites_csv() -> &'static str {
    "forest,site,plot,latitude,altitude_m,soil_cn_ratio,soil_moisture,clearcut_year,conifer_share,station\n\
     CC,1,1,62.5,180,31.5,mesic,1995,0.8,S1\n\
     CC,1,2,62.5,210,24.0,dry,,0.6,S1\n"
}

fn daily_climate_csv(first_year: i32, last_year: i32) -> String {
    let mut climate = String::from("station,date,t_mean,t_min,t_max,precip_mm,rh_percent\n");
    let start = NaiveDate::from_ymd_opt(first_year, 1, 1).expect("valid start date");
    let end = NaiveDate::from_ymd_opt(last_year, 12, 31).expect("valid end date");
    for date in start.iter_days().take_while(|date| *date <= end) {
        let doy = f64::from(date.ordinal());
        let year = f64::from(date.year());
        let seasonal = (2.0 * std::f64::consts::PI * (doy - 15.0) / 365.0).cos();
        let t_mean = 3.0 - 15.0 * seasonal + 0.8 * (year * 1.7).sin();
        let precip = (1.5 + 1.5 * (doy * 0.3 + year).sin()).max(0.0);
        let rh = 70.0 + 10.0 * (doy / 29.0).sin();
        writeln!(
            climate,
            "S1,{date},{t_mean:.2},{:.2},{:.2},{precip:.2},{rh:.1}",
            t_mean - 4.0,
            t_mean + 5.0
        )
        .expect("string write");
    }
    climate
}

fn write_pipeline_fixture(root: &Path) -> std::path::PathBuf {
    write_file(&root.join("data/rings.csv"), &rings_csv());
    write_file(&root.join("data/sites.csv"), sites_csv());
    write_file(
        &root.join("data/climate_daily.csv"),
        &daily_climate_csv(1971, 2010),
    );

    let config = serde_json::json!({
        "ringsPath": "data/rings.csv",
        "sitesPath": "data/sites.csv",
        "climatePath": "data/climate_daily.csv",
        "outputDir": "out",
        "models": [
            { "table": "tree", "response": "diameter_mm", "predictors": ["sensitivity_raw"] }
        ]
    });
    let config_path = root.join("pipeline.json");
    write_file(
        &config_path,
        &serde_json::to_string_pretty(&config).expect("config should serialize"),
    );
    config_path
}

fn read_table(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("table should open");
    let header = reader
        .headers()
        .expect("header should parse")
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            record
                .expect("record should parse")
                .iter()
                .map(String::from)
                .collect()
        })
        .collect();
    (header, rows)
}

fn column<'a>(header: &[String], rows: &'a [Vec<String>], name: &str) -> Vec<&'a str> {
    let index = header
        .iter()
        .position(|column| column == name)
        .unwrap_or_else(|| panic!("column '{name}' should exist"));
    rows.iter().map(|row| row[index].as_str()).collect()
}

#[test]
fn run_command_writes_every_artifact_deterministically() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = write_pipeline_fixture(temp.path());
    let config_arg = config_path.to_string_lossy().to_string();

    let output = run_dendro(&["run", "--config", &config_arg]);
    assert!(
        output.status.success(),
        "run should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trees: 10 aligned"), "stdout: {stdout}");
    assert!(stdout.contains("models fitted: 1"), "stdout: {stdout}");

    let out_dir = temp.path().join("out");
    let first_run: Vec<Vec<u8>> = ARTIFACTS
        .iter()
        .map(|file| fs::read(out_dir.join(file)).unwrap_or_else(|_| panic!("{file} should exist")))
        .collect();

    let (header, rows) = read_table(&out_dir.join("master_table.csv"));
    assert_eq!(rows.len(), 2, "both plots should pass the quality screen");
    assert_eq!(column(&header, &rows, "clearcut_year"), vec!["1995", ""]);
    assert_eq!(column(&header, &rows, "disturbance_year"), vec!["1995", ""]);
    assert!(
        column(&header, &rows, "season_length_days")
            .iter()
            .all(|cell| !cell.is_empty()),
        "growing-season summaries should be joined by station"
    );
    assert!(
        column(&header, &rows, "resilience_rwi")[0]
            .parse::<f64>()
            .is_ok(),
        "clearcut plot should carry resilience"
    );

    let (header, rows) = read_table(&out_dir.join("tree_features.csv"));
    assert_eq!(rows.len(), 10);
    assert!(
        column(&header, &rows, "biomass_kg")
            .iter()
            .all(|cell| cell.parse::<f64>().is_ok_and(|kg| kg > 0.0))
    );

    let exclusions =
        fs::read_to_string(out_dir.join("exclusions.csv")).expect("exclusions should be readable");
    assert!(exclusions.contains("ALIGNMENT"), "{exclusions}");
    assert!(exclusions.contains("broken"), "{exclusions}");

    let (header, rows) = read_table(&out_dir.join("models.csv"));
    assert_eq!(
        column(&header, &rows, "term"),
        vec!["(intercept)", "sensitivity_raw"]
    );

    let second = run_dendro(&["run", "--config", &config_arg]);
    assert!(second.status.success());
    for (file, first_bytes) in ARTIFACTS.iter().zip(&first_run) {
        let second_bytes = fs::read(out_dir.join(file)).expect("artifact should be readable");
        assert_eq!(&second_bytes, first_bytes, "{file} should be byte-identical");
    }
}

#[test]
fn run_command_maps_configuration_errors_to_exit_codes() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("absent.json");
    let output = run_dendro(&["run", "--config", &missing.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[CONFIG.READ]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 3"), "stderr: {stderr}");

    let malformed = temp.path().join("bad.json");
    write_file(&malformed, "{ \"quality\": 5 }");
    let output = run_dendro(&["run", "--config", &malformed.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[CONFIG.PARSE]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"), "stderr: {stderr}");

    let truncated = temp.path().join("truncated.json");
    write_file(&truncated, "{ \"ringsPath\": ");
    let output = run_dendro(&["run", "--config", &truncated.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn detrend_command_writes_indices_near_one() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("wide.csv");
    let mut wide = String::from("year,a,b\n");
    for (age, year) in (1961..=2000).enumerate() {
        let t = age as u32;
        writeln!(wide, "{year},{:.4},{:.4}", ring_width(1, t), ring_width(2, t))
            .expect("string write");
    }
    write_file(&input, &wide);
    let output_path = temp.path().join("nested/rwi.csv");

    let output = run_dendro(&[
        "detrend",
        "--input",
        &input.to_string_lossy(),
        "--output",
        &output_path.to_string_lossy(),
        "--rigidity",
        "20",
    ]);
    assert!(
        output.status.success(),
        "detrend should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (header, rows) = read_table(&output_path);
    assert_eq!(header, vec!["year", "a", "b"]);
    assert_eq!(rows.len(), 40);
    for name in ["a", "b"] {
        let values: Vec<f64> = column(&header, &rows, name)
            .iter()
            .map(|cell| cell.parse::<f64>().expect("index should be numeric"))
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mean - 1.0).abs() < 0.05, "{name} mean index {mean}");
    }
}

#[test]
fn climate_command_reports_growing_seasons_per_year() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("daily.csv");
    write_file(&input, &daily_climate_csv(2001, 2003));
    let output_dir = temp.path().join("climate");

    let output = run_dendro(&[
        "climate",
        "--input",
        &input.to_string_lossy(),
        "--latitude",
        "62.5",
        "--output-dir",
        &output_dir.to_string_lossy(),
    ]);
    assert!(
        output.status.success(),
        "climate should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (header, rows) = read_table(&output_dir.join("growing_season.csv"));
    assert_eq!(column(&header, &rows, "year"), vec!["2001", "2002", "2003"]);
    for length in column(&header, &rows, "length_days") {
        let days: u32 = length.parse().expect("length should be an integer");
        assert!((150..200).contains(&days), "season length {days}");
    }

    let (_, monthly) = read_table(&output_dir.join("climate_monthly.csv"));
    assert_eq!(monthly.len(), 36);
}
