//! Back-calculated cumulative diameter and biomass from ring widths.

pub mod allometry;

pub use allometry::{AllometryTable, BiomassComponent, ComponentCoefficients, SpeciesAllometry};

use crate::common::constants::MM_PER_CM;
use crate::domain::{
    DendroError, ExclusionLog, PipelineStage, Series, SeriesTable, TreeKey,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingGridError {
    #[error("ring grid years must be strictly ascending: {previous} is followed by {year}")]
    NonAscendingYears { previous: i32, year: i32 },
    #[error("column '{column}' has {actual} rows, the grid has {expected} years")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl From<RingGridError> for DendroError {
    fn from(error: RingGridError) -> Self {
        DendroError::internal("BIOMASS.GRID", error.to_string())
    }
}

/// Ring widths (mm) on a years × trees grid. Row order is chronological and
/// checked on construction; the recurrences below index rows directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RingGrid<K> {
    years: Vec<i32>,
    columns: Vec<(K, Vec<Option<f64>>)>,
}

impl<K: Ord + Clone + ToString> RingGrid<K> {
    pub fn new(years: Vec<i32>, columns: Vec<(K, Vec<Option<f64>>)>) -> Result<Self, RingGridError> {
        if let Some(pair) = years.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(RingGridError::NonAscendingYears {
                previous: pair[0],
                year: pair[1],
            });
        }
        if let Some((key, column)) = columns.iter().find(|(_, column)| column.len() != years.len()) {
            return Err(RingGridError::ColumnLength {
                column: key.to_string(),
                expected: years.len(),
                actual: column.len(),
            });
        }
        Ok(Self { years, columns })
    }

    /// Grid spanning every year covered by the table.
    pub fn from_table(table: &SeriesTable<K>) -> Result<Self, RingGridError> {
        let Some((first, last)) = table.year_span() else {
            return Self::new(Vec::new(), Vec::new());
        };
        let years: Vec<i32> = (first..=last).collect();
        let columns = table
            .iter()
            .map(|(key, series)| {
                let column = years.iter().map(|year| series.get(*year)).collect();
                (key.clone(), column)
            })
            .collect();
        Self::new(years, columns)
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn columns(&self) -> impl Iterator<Item = (&K, &[Option<f64>])> {
        self.columns
            .iter()
            .map(|(key, column)| (key, column.as_slice()))
    }
}

/// Cumulative diameter (mm) per chronological position:
/// `D_j = 2·Σ_{i≥j} w_i`, accumulated from the newest ring backwards.
///
/// Positions outside the measured rings, and missing widths, stay missing.
pub fn cumulative_diameters(widths: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut diameters = vec![None; widths.len()];
    let mut accumulated = 0.0;
    for index in (0..widths.len()).rev() {
        if let Some(width) = widths[index] {
            accumulated += 2.0 * width;
            diameters[index] = Some(accumulated);
        }
    }
    diameters
}

/// `increment_j = B_j − B_{j+1}`; the newest position keeps its own value.
pub fn biomass_increments(biomass: &[Option<f64>]) -> Vec<Option<f64>> {
    let Some(newest) = biomass.iter().rposition(Option::is_some) else {
        return vec![None; biomass.len()];
    };
    (0..biomass.len())
        .map(|index| {
            let current = biomass[index]?;
            if index == newest {
                return Some(current);
            }
            let next = biomass[index + 1..]
                .iter()
                .find_map(|value| *value)?;
            Some(current - next)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeBiomass {
    pub diameter_mm: Series,
    pub biomass_kg: Series,
    pub increment_kg: Series,
}

impl TreeBiomass {
    /// Largest back-calculated diameter, `2·Σw`.
    pub fn total_diameter_mm(&self) -> Option<f64> {
        self.diameter_mm
            .present()
            .map(|(_, value)| value)
            .reduce(f64::max)
    }

    pub fn total_biomass_kg(&self) -> Option<f64> {
        self.biomass_kg
            .present()
            .map(|(_, value)| value)
            .reduce(f64::max)
    }

    /// Mean increment over the `years` most recent measured positions.
    pub fn recent_mean_increment(&self, years: usize) -> Option<f64> {
        let increments: Vec<f64> = self.increment_kg.present().map(|(_, value)| value).collect();
        let recent = &increments[increments.len().saturating_sub(years)..];
        crate::numerics::mean(recent)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BiomassReport {
    pub trees: BTreeMap<TreeKey, TreeBiomass>,
    pub exclusions: ExclusionLog,
}

pub fn reconstruct_biomass(grid: &RingGrid<TreeKey>, allometry: &AllometryTable) -> BiomassReport {
    let mut report = BiomassReport::default();
    let first_year = grid.years().first().copied().unwrap_or_default();

    for (key, widths) in grid.columns() {
        let Some(species) = allometry.get(&key.species) else {
            report.exclusions.record(
                PipelineStage::Biomass,
                key.to_string(),
                format!("no allometry for species '{}'", key.species),
            );
            continue;
        };

        let diameters = cumulative_diameters(widths);
        let biomass: Vec<Option<f64>> = diameters
            .iter()
            .map(|diameter| diameter.and_then(|mm| species.biomass_kg(mm / MM_PER_CM)))
            .collect();
        let increments = biomass_increments(&biomass);

        tracing::debug!(tree = %key, rings = widths.iter().flatten().count(), "reconstructed biomass");
        report.trees.insert(
            key.clone(),
            TreeBiomass {
                diameter_mm: Series::new(first_year, diameters),
                biomass_kg: Series::new(first_year, biomass),
                increment_kg: Series::new(first_year, increments),
            },
        );
    }

    tracing::info!(trees = report.trees.len(), "biomass reconstruction complete");
    report
}
