use super::TableReadError;
use crate::domain::{
    DailyClimate, ExclusionLog, PipelineStage, Series, SeriesTable, SiteAttributes, SiteKey,
};
use crate::modules::alignment::{IdScheme, RawIdentifier, RawRingRecord, canonical_site_key};
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CompositeRingRow {
    raw_id: String,
    measured_year: i32,
    year: i32,
    #[serde(deserialize_with = "csv::invalid_option")]
    width_mm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ColumnRingRow {
    species: String,
    forest: String,
    site: String,
    plot: String,
    tree: String,
    measured_year: i32,
    year: i32,
    #[serde(deserialize_with = "csv::invalid_option")]
    width_mm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    forest: String,
    site: String,
    plot: String,
    latitude: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    altitude_m: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    soil_cn_ratio: Option<f64>,
    #[serde(default)]
    soil_moisture: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    clearcut_year: Option<i32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    conifer_share: Option<f64>,
    station: String,
}

#[derive(Debug, Deserialize)]
struct DailyClimateRow {
    station: String,
    date: NaiveDate,
    #[serde(deserialize_with = "csv::invalid_option")]
    t_mean: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    t_min: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    t_max: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    precip_mm: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    rh_percent: Option<f64>,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, TableReadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| TableReadError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Deserializes every data row, pairing it with its 1-based data row number.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<(usize, T)>, TableReadError> {
    let mut reader = open_reader(path)?;
    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(index, row)| {
            row.map(|row| (index + 1, row))
                .map_err(|source| TableReadError::Record {
                    path: path.to_path_buf(),
                    row: index + 1,
                    source,
                })
        })
        .collect()
}

/// Ring-width rows in long format. The `Columns` scheme expects the five key
/// fields as separate columns; the other schemes read a single `raw_id`.
pub fn read_ring_records(
    path: &Path,
    scheme: &IdScheme,
) -> Result<Vec<RawRingRecord>, TableReadError> {
    let records: Vec<RawRingRecord> = match scheme {
        IdScheme::Columns => read_rows::<ColumnRingRow>(path)?
            .into_iter()
            .map(|(row, record)| RawRingRecord {
                row,
                identifier: RawIdentifier::Columns([
                    record.species,
                    record.forest,
                    record.site,
                    record.plot,
                    record.tree,
                ]),
                measured_year: record.measured_year,
                year: record.year,
                width_mm: record.width_mm,
            })
            .collect(),
        IdScheme::Delimited { .. } | IdScheme::FixedWidth { .. } => {
            read_rows::<CompositeRingRow>(path)?
                .into_iter()
                .map(|(row, record)| RawRingRecord {
                    row,
                    identifier: RawIdentifier::Composite(record.raw_id),
                    measured_year: record.measured_year,
                    year: record.year,
                    width_mm: record.width_mm,
                })
                .collect()
        }
    };
    tracing::debug!(path = %path.display(), rows = records.len(), "read ring records");
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteCatalog {
    pub sites: BTreeMap<SiteKey, SiteAttributes>,
    pub exclusions: ExclusionLog,
}

impl SiteCatalog {
    /// Latitude of each climate station, taken from the first site that
    /// references it.
    pub fn station_latitudes(&self) -> BTreeMap<String, f64> {
        let mut latitudes = BTreeMap::new();
        for site in self.sites.values() {
            latitudes
                .entry(site.station.clone())
                .or_insert(site.latitude);
        }
        latitudes
    }
}

/// Site metadata keyed by canonical `(forest, site, plot)`. Rows with an
/// unusable key or a non-finite latitude are logged and skipped; a repeated
/// key keeps the first row.
pub fn read_sites(path: &Path) -> Result<SiteCatalog, TableReadError> {
    let mut catalog = SiteCatalog::default();
    for (row, record) in read_rows::<SiteRow>(path)? {
        let entity = format!("sites row {row}");
        let Some(key) = canonical_site_key(&record.forest, &record.site, &record.plot) else {
            catalog.exclusions.record(
                PipelineStage::Alignment,
                entity,
                "site key has an empty field",
            );
            continue;
        };
        if !record.latitude.is_finite() {
            catalog
                .exclusions
                .record(PipelineStage::Alignment, entity, "latitude is not finite");
            continue;
        }
        if catalog.sites.contains_key(&key) {
            catalog.exclusions.record(
                PipelineStage::Alignment,
                entity,
                format!("duplicate site {key}"),
            );
            continue;
        }

        let attributes = SiteAttributes {
            key: key.clone(),
            latitude: record.latitude,
            altitude_m: record.altitude_m,
            soil_cn_ratio: record.soil_cn_ratio,
            soil_moisture: record
                .soil_moisture
                .filter(|class| !class.trim().is_empty()),
            clearcut_year: record.clearcut_year,
            conifer_share: record.conifer_share,
            station: record.station.trim().to_string(),
        };
        catalog.sites.insert(key, attributes);
    }
    tracing::debug!(path = %path.display(), sites = catalog.sites.len(), "read site metadata");
    Ok(catalog)
}

pub fn read_daily_climate(path: &Path) -> Result<Vec<DailyClimate>, TableReadError> {
    let days: Vec<DailyClimate> = read_rows::<DailyClimateRow>(path)?
        .into_iter()
        .map(|(_, record)| DailyClimate {
            station: record.station,
            date: record.date,
            t_mean: record.t_mean,
            t_min: record.t_min,
            t_max: record.t_max,
            precip_mm: record.precip_mm,
            rh_percent: record.rh_percent,
        })
        .collect();
    tracing::debug!(path = %path.display(), days = days.len(), "read daily climate");
    Ok(days)
}

/// Wide table: a `year` column followed by one column per series. Empty or
/// non-numeric cells are missing values.
pub fn read_wide_series(path: &Path) -> Result<SeriesTable<String>, TableReadError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| TableReadError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    if headers.get(0) != Some("year") {
        return Err(TableReadError::MissingColumn {
            path: path.to_path_buf(),
            column: "year",
        });
    }

    let mut columns: Vec<Vec<(i32, f64)>> = vec![Vec::new(); headers.len() - 1];
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|source| TableReadError::Record {
            path: path.to_path_buf(),
            row,
            source,
        })?;
        let year: i32 = record
            .get(0)
            .and_then(|cell| cell.parse().ok())
            .ok_or_else(|| TableReadError::InvalidYear {
                path: path.to_path_buf(),
                row,
            })?;
        for (column, cell) in columns.iter_mut().zip(record.iter().skip(1)) {
            if let Ok(value) = cell.parse::<f64>() {
                column.push((year, value));
            }
        }
    }

    let mut table = SeriesTable::new();
    for (name, pairs) in headers.iter().skip(1).zip(columns) {
        let series = Series::from_pairs(pairs).map_err(|source| TableReadError::Series {
            path: path.to_path_buf(),
            column: name.to_string(),
            source,
        })?;
        table.insert(name.to_string(), series);
    }
    Ok(table)
}
