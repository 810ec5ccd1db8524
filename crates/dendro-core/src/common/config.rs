//! JSON pipeline configuration. Every field has a default; relative paths
//! resolve against the directory holding the configuration file.

use crate::common::constants::DEFAULT_RECENT_INCREMENT_YEARS;
use crate::domain::DendroError;
use crate::modules::alignment::IdScheme;
use crate::modules::biomass::SpeciesAllometry;
use crate::modules::climate::ClimateConfig;
use crate::modules::detrend::DetrendConfig;
use crate::modules::ecology::EcologyConfig;
use crate::modules::modeling::ModelSpec;
use crate::modules::quality::QualityConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub rings_path: PathBuf,
    pub sites_path: PathBuf,
    pub climate_path: PathBuf,
    pub output_dir: PathBuf,
    pub id_scheme: IdScheme,
    pub quality: QualityConfig,
    pub detrend: DetrendConfig,
    pub climate: ClimateConfig,
    pub ecology: EcologyConfig,
    /// Detrend the annual climate driver (difference form) before it is
    /// compared with ring-width indices.
    pub detrend_driver: bool,
    pub recent_increment_years: usize,
    pub allometry: Vec<SpeciesAllometry>,
    pub models: Vec<ModelSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rings_path: PathBuf::from("rings.csv"),
            sites_path: PathBuf::from("sites.csv"),
            climate_path: PathBuf::from("climate_daily.csv"),
            output_dir: PathBuf::from("output"),
            id_scheme: IdScheme::default(),
            quality: QualityConfig::default(),
            detrend: DetrendConfig::default(),
            climate: ClimateConfig::default(),
            ecology: EcologyConfig::default(),
            detrend_driver: true,
            recent_increment_years: DEFAULT_RECENT_INCREMENT_YEARS,
            allometry: Vec::new(),
            models: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn resolve_paths(mut self, base_dir: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };
        resolve(&mut self.rings_path);
        resolve(&mut self.sites_path);
        resolve(&mut self.climate_path);
        resolve(&mut self.output_dir);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("failed to read pipeline config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse pipeline config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<PipelineConfigError> for DendroError {
    fn from(error: PipelineConfigError) -> Self {
        match &error {
            PipelineConfigError::Read { .. } => {
                DendroError::io_system("CONFIG.READ", error.to_string())
            }
            PipelineConfigError::Parse { .. } => {
                DendroError::input_validation("CONFIG.PARSE", error.to_string())
            }
        }
    }
}

pub fn load_pipeline_config(
    config_path: impl AsRef<Path>,
) -> Result<PipelineConfig, PipelineConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| PipelineConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig =
        serde_json::from_str(&source).map_err(|source| PipelineConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base_dir))
}
