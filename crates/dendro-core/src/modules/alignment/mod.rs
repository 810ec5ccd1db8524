mod parser;

pub use parser::{IdParseError, parse_tree_key};

use crate::domain::{ExclusionLog, PipelineStage, Series, SeriesTable, SiteKey, TreeKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IdScheme {
    /// `species<sep>forest<sep>site<sep>plot<sep>tree`
    Delimited { separator: char },
    /// Fixed widths for species, forest, site and plot; the remainder is the tree.
    FixedWidth { widths: [usize; 4] },
    /// The five key fields arrive as separate columns.
    Columns,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::Delimited { separator: '_' }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawIdentifier {
    Composite(String),
    Columns([String; 5]),
}

impl RawIdentifier {
    fn describe(&self) -> String {
        match self {
            Self::Composite(raw) => raw.clone(),
            Self::Columns(columns) => columns.join("|"),
        }
    }
}

/// Site join key with the same field canonicalization as tree identifiers,
/// so that a site table plot `03` joins rings recorded with plot `3`.
pub fn canonical_site_key(forest: &str, site: &str, plot: &str) -> Option<SiteKey> {
    Some(SiteKey::new(
        parser::canonical_token(forest)?,
        parser::canonical_token(site)?,
        parser::canonical_token(plot)?,
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRingRecord {
    pub row: usize,
    pub identifier: RawIdentifier,
    pub measured_year: i32,
    pub year: i32,
    pub width_mm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentReport {
    pub series: SeriesTable<TreeKey>,
    pub exclusions: ExclusionLog,
    pub parsed_rows: usize,
    pub unparsed_rows: usize,
    pub superseded_rows: usize,
    pub duplicate_years: usize,
}

/// Resolves raw ring records to canonical tree series.
///
/// Only the most recent measurement campaign of each tree is kept; older
/// campaigns are counted as superseded. Rows whose identifier cannot be
/// parsed are excluded and logged, never fatal.
pub fn align_ring_records(records: &[RawRingRecord], scheme: &IdScheme) -> AlignmentReport {
    let mut report = AlignmentReport::default();
    let mut by_tree: BTreeMap<TreeKey, Vec<&RawRingRecord>> = BTreeMap::new();

    for record in records {
        match parse_tree_key(&record.identifier, scheme) {
            Ok(key) => {
                report.parsed_rows += 1;
                by_tree.entry(key).or_default().push(record);
            }
            Err(error) => {
                report.unparsed_rows += 1;
                report.exclusions.record(
                    PipelineStage::Alignment,
                    format!("row {} '{}'", record.row, record.identifier.describe()),
                    format!("identifier parse failure: {error}"),
                );
            }
        }
    }

    for (key, rows) in by_tree {
        let Some(latest_campaign) = rows.iter().map(|row| row.measured_year).max() else {
            continue;
        };

        let mut widths: BTreeMap<i32, f64> = BTreeMap::new();
        for row in rows {
            if row.measured_year != latest_campaign {
                report.superseded_rows += 1;
                continue;
            }
            let Some(width) = row.width_mm.filter(|width| width.is_finite()) else {
                continue;
            };
            if widths.contains_key(&row.year) {
                report.duplicate_years += 1;
                report.exclusions.record(
                    PipelineStage::Alignment,
                    format!("row {} ({key})", row.row),
                    format!("duplicate measurement of year {}", row.year),
                );
                continue;
            }
            widths.insert(row.year, width);
        }

        if widths.is_empty() {
            report.exclusions.record(
                PipelineStage::Alignment,
                key.to_string(),
                format!("no ring widths in campaign {latest_campaign}"),
            );
            continue;
        }

        match Series::from_pairs(widths) {
            Ok(series) => {
                report.series.insert(key, series);
            }
            Err(error) => report.exclusions.record(
                PipelineStage::Alignment,
                key.to_string(),
                error.to_string(),
            ),
        }
    }

    tracing::info!(
        trees = report.series.len(),
        parsed = report.parsed_rows,
        unparsed = report.unparsed_rows,
        superseded = report.superseded_rows,
        "aligned ring records"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::{
        AlignmentReport, IdScheme, RawIdentifier, RawRingRecord, align_ring_records,
        canonical_site_key,
    };
    use crate::domain::{PipelineStage, SiteKey, TreeKey};

    fn record(row: usize, id: &str, campaign: i32, year: i32, width: Option<f64>) -> RawRingRecord {
        RawRingRecord {
            row,
            identifier: RawIdentifier::Composite(id.to_string()),
            measured_year: campaign,
            year,
            width_mm: width,
        }
    }

    fn align(records: &[RawRingRecord]) -> AlignmentReport {
        align_ring_records(records, &IdScheme::default())
    }

    #[test]
    fn inconsistent_spellings_resolve_to_one_tree() {
        let report = align(&[
            record(1, "PS_CC_03_2_14", 2019, 2000, Some(1.2)),
            record(2, "ps_cc_3_02_014", 2019, 2001, Some(1.4)),
        ]);

        assert_eq!(report.series.len(), 1);
        let series = report
            .series
            .get(&TreeKey::new("PS", "CC", "3", "2", "14"))
            .expect("tree should be present");
        assert_eq!(series.values(), &[Some(1.2), Some(1.4)]);
        assert!(report.exclusions.is_empty());
    }

    #[test]
    fn only_latest_campaign_is_kept() {
        let report = align(&[
            record(1, "PS_CC_1_1_1", 2015, 2000, Some(9.0)),
            record(2, "PS_CC_1_1_1", 2015, 2001, Some(9.0)),
            record(3, "PS_CC_1_1_1", 2021, 2000, Some(1.0)),
            record(4, "PS_CC_1_1_1", 2021, 2001, Some(2.0)),
            record(5, "PS_CC_1_1_1", 2021, 2002, Some(3.0)),
        ]);

        let series = report
            .series
            .get(&TreeKey::new("PS", "CC", "1", "1", "1"))
            .expect("tree should be present");
        assert_eq!(series.values(), &[Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(report.superseded_rows, 2);
    }

    #[test]
    fn unparseable_rows_are_excluded_and_counted() {
        let report = align(&[
            record(1, "PS_CC_1_1_1", 2020, 2000, Some(1.0)),
            record(2, "PS_CC_1", 2020, 2000, Some(1.0)),
            record(3, "PS__1_1_1", 2020, 2000, Some(1.0)),
        ]);

        assert_eq!(report.series.len(), 1);
        assert_eq!(report.parsed_rows, 1);
        assert_eq!(report.unparsed_rows, 2);
        assert_eq!(report.exclusions.count_for(PipelineStage::Alignment), 2);
        assert!(report.exclusions.entries()[0].entity.contains("row 2"));
    }

    #[test]
    fn duplicate_years_keep_first_record_and_missing_widths_leave_gaps() {
        let report = align(&[
            record(1, "PA_OG_2_1_7", 2020, 2000, Some(1.0)),
            record(2, "PA_OG_2_1_7", 2020, 2000, Some(5.0)),
            record(3, "PA_OG_2_1_7", 2020, 2001, None),
            record(4, "PA_OG_2_1_7", 2020, 2002, Some(3.0)),
        ]);

        let series = report
            .series
            .get(&TreeKey::new("PA", "OG", "2", "1", "7"))
            .expect("tree should be present");
        assert_eq!(series.values(), &[Some(1.0), None, Some(3.0)]);
        assert_eq!(report.duplicate_years, 1);
        assert_eq!(report.exclusions.len(), 1);
    }

    #[test]
    fn trees_without_widths_are_logged() {
        let report = align(&[record(1, "PA_OG_2_1_8", 2020, 2000, None)]);
        assert!(report.series.is_empty());
        assert_eq!(report.exclusions.len(), 1);
    }

    #[test]
    fn site_keys_share_identifier_canonicalization() {
        assert_eq!(
            canonical_site_key("cc", "03", " 2 "),
            Some(SiteKey::new("CC", "3", "2"))
        );
        assert_eq!(canonical_site_key("CC", "", "2"), None);
    }
}
