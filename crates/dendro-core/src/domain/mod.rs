pub mod errors;
mod series;

pub use errors::{DendroError, DendroErrorCategory, DendroResult};
pub use series::{MeanChronology, Series, SeriesError, SeriesTable};

use chrono::NaiveDate;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineStage {
    Alignment,
    Quality,
    Detrend,
    Climate,
    Season,
    Biomass,
    Master,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alignment => "ALIGNMENT",
            Self::Quality => "QUALITY",
            Self::Detrend => "DETREND",
            Self::Climate => "CLIMATE",
            Self::Season => "SEASON",
            Self::Biomass => "BIOMASS",
            Self::Master => "MASTER",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Canonical identity of one physical tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeKey {
    pub species: String,
    pub forest: String,
    pub site: String,
    pub plot: String,
    pub tree: String,
}

impl TreeKey {
    pub fn new(
        species: impl Into<String>,
        forest: impl Into<String>,
        site: impl Into<String>,
        plot: impl Into<String>,
        tree: impl Into<String>,
    ) -> Self {
        Self {
            species: species.into(),
            forest: forest.into(),
            site: site.into(),
            plot: plot.into(),
            tree: tree.into(),
        }
    }

    pub fn plot_key(&self) -> PlotKey {
        PlotKey {
            species: self.species.clone(),
            forest: self.forest.clone(),
            site: self.site.clone(),
            plot: self.plot.clone(),
        }
    }

    pub fn site_key(&self) -> SiteKey {
        self.plot_key().site_key()
    }
}

impl Display for TreeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.species, self.forest, self.site, self.plot, self.tree
        )
    }
}

/// A species-specific chronology group: all trees of one species on one plot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlotKey {
    pub species: String,
    pub forest: String,
    pub site: String,
    pub plot: String,
}

impl PlotKey {
    pub fn site_key(&self) -> SiteKey {
        SiteKey {
            forest: self.forest.clone(),
            site: self.site.clone(),
            plot: self.plot.clone(),
        }
    }
}

impl Display for PlotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.species, self.forest, self.site, self.plot
        )
    }
}

/// Join key for static site attributes (forest type x site x subplot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteKey {
    pub forest: String,
    pub site: String,
    pub plot: String,
}

impl SiteKey {
    pub fn new(
        forest: impl Into<String>,
        site: impl Into<String>,
        plot: impl Into<String>,
    ) -> Self {
        Self {
            forest: forest.into(),
            site: site.into(),
            plot: plot.into(),
        }
    }
}

impl Display for SiteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.forest, self.site, self.plot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteAttributes {
    pub key: SiteKey,
    pub latitude: f64,
    pub altitude_m: Option<f64>,
    pub soil_cn_ratio: Option<f64>,
    pub soil_moisture: Option<String>,
    pub clearcut_year: Option<i32>,
    pub conifer_share: Option<f64>,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyClimate {
    pub station: String,
    pub date: NaiveDate,
    pub t_mean: Option<f64>,
    pub t_min: Option<f64>,
    pub t_max: Option<f64>,
    pub precip_mm: Option<f64>,
    pub rh_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub stage: PipelineStage,
    pub entity: String,
    pub reason: String,
}

/// Non-fatal exclusions collected by a stage. Each entry names the smallest
/// entity (row, tree, group, site-year) that was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionLog {
    entries: Vec<Exclusion>,
}

impl ExclusionLog {
    pub fn record(
        &mut self,
        stage: PipelineStage,
        entity: impl Into<String>,
        reason: impl Into<String>,
    ) {
        let exclusion = Exclusion {
            stage,
            entity: entity.into(),
            reason: reason.into(),
        };
        tracing::warn!(
            stage = %exclusion.stage,
            entity = %exclusion.entity,
            "excluded: {}",
            exclusion.reason
        );
        self.entries.push(exclusion);
    }

    pub fn extend(&mut self, other: ExclusionLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Exclusion] {
        &self.entries
    }

    pub fn count_for(&self, stage: PipelineStage) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.stage == stage)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExclusionLog, PipelineStage, TreeKey};

    #[test]
    fn tree_key_projects_to_plot_and_site_keys() {
        let key = TreeKey::new("PS", "CC", "3", "2", "14");
        assert_eq!(key.to_string(), "PS_CC_3_2_14");
        assert_eq!(key.plot_key().to_string(), "PS_CC_3_2");
        assert_eq!(key.site_key().to_string(), "CC_3_2");
    }

    #[test]
    fn tree_keys_order_by_component_sequence() {
        let mut keys = vec![
            TreeKey::new("PS", "CC", "3", "2", "2"),
            TreeKey::new("PA", "OG", "1", "1", "1"),
            TreeKey::new("PS", "CC", "3", "1", "9"),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["PA_OG_1_1_1", "PS_CC_3_1_9", "PS_CC_3_2_2"]
        );
    }

    #[test]
    fn exclusion_log_counts_per_stage() {
        let mut log = ExclusionLog::default();
        log.record(PipelineStage::Alignment, "row 3", "unparseable id");
        log.record(PipelineStage::Quality, "PS_CC_3_2_14", "low correlation");
        log.record(PipelineStage::Alignment, "row 9", "unparseable id");

        assert_eq!(log.len(), 3);
        assert_eq!(log.count_for(PipelineStage::Alignment), 2);
        assert_eq!(log.count_for(PipelineStage::Season), 0);

        let mut merged = ExclusionLog::default();
        merged.extend(log);
        assert_eq!(merged.entries()[1].entity, "PS_CC_3_2_14");
    }
}
