//! Flat-file inputs and outputs of the pipeline.

mod readers;
pub mod writers;

pub use readers::{
    SiteCatalog, read_daily_climate, read_ring_records, read_sites, read_wide_series,
};

use crate::domain::{DendroError, SeriesError};
use crate::modules::serialization::ArtifactWriteError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TableReadError {
    #[error("failed to open '{}': {source}", path.display())]
    Open { path: PathBuf, source: csv::Error },
    #[error("'{}' row {row}: {source}", path.display())]
    Record {
        path: PathBuf,
        row: usize,
        source: csv::Error,
    },
    #[error("'{}' has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("'{}' row {row}: year is not an integer", path.display())]
    InvalidYear { path: PathBuf, row: usize },
    #[error("'{}' column '{column}': {source}", path.display())]
    Series {
        path: PathBuf,
        column: String,
        source: SeriesError,
    },
}

impl From<TableReadError> for DendroError {
    fn from(error: TableReadError) -> Self {
        match &error {
            TableReadError::Open { source, .. } if source.is_io_error() => {
                DendroError::io_system("INPUT.OPEN", error.to_string())
            }
            _ => DendroError::input_validation("INPUT.TABLE", error.to_string()),
        }
    }
}

impl From<ArtifactWriteError> for DendroError {
    fn from(error: ArtifactWriteError) -> Self {
        DendroError::io_system("OUTPUT.WRITE", error.to_string())
    }
}
