use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("year {year} appears more than once in the series")]
    DuplicateYear { year: i32 },
}

/// Annual values for one entity, stored densely from `first_year`.
///
/// Gaps are `None`. Non-finite inputs are normalized to `None` so that a
/// missing measurement can never masquerade as a number downstream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    first_year: i32,
    values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(first_year: i32, values: Vec<Option<f64>>) -> Self {
        let values = values
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()))
            .collect();
        Self { first_year, values }
    }

    pub fn from_values(first_year: i32, values: &[f64]) -> Self {
        Self::new(first_year, values.iter().copied().map(Some).collect())
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (i32, f64)>,
    {
        let mut by_year = BTreeMap::new();
        for (year, value) in pairs {
            if by_year.insert(year, value).is_some() {
                return Err(SeriesError::DuplicateYear { year });
            }
        }

        let (Some(&first_year), Some(&last_year)) =
            (by_year.keys().next(), by_year.keys().next_back())
        else {
            return Ok(Self::default());
        };

        let values = (first_year..=last_year)
            .map(|year| by_year.get(&year).copied())
            .collect();
        Ok(Self::new(first_year, values))
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.first_year + self.values.len() as i32 - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        let offset = year.checked_sub(self.first_year)?;
        if offset < 0 {
            return None;
        }
        self.values.get(offset as usize).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, Option<f64>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(offset, value)| (self.first_year + offset as i32, *value))
    }

    pub fn present(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.iter()
            .filter_map(|(year, value)| value.map(|v| (year, v)))
    }

    pub fn count_present(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    /// First and last year carrying a value.
    pub fn valid_range(&self) -> Option<(i32, i32)> {
        let first = self.values.iter().position(Option::is_some)?;
        let last = self.values.iter().rposition(Option::is_some)?;
        Some((
            self.first_year + first as i32,
            self.first_year + last as i32,
        ))
    }

    pub fn restrict(&self, from_year: i32, to_year: i32) -> Series {
        if from_year > to_year {
            return Series::default();
        }
        let values = (from_year..=to_year).map(|year| self.get(year)).collect();
        Series::new(from_year, values)
    }

    pub fn restrict_from(&self, from_year: i32) -> Series {
        if self.is_empty() {
            return Series::default();
        }
        self.restrict(from_year.max(self.first_year), self.last_year())
    }

    pub fn map_values<F>(&self, mut f: F) -> Series
    where
        F: FnMut(f64) -> Option<f64>,
    {
        Series::new(
            self.first_year,
            self.values.iter().map(|value| value.and_then(&mut f)).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeanChronology {
    pub series: Series,
    pub sample_depth: Vec<usize>,
}

/// Ordered collection of series keyed by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable<K: Ord> {
    series: BTreeMap<K, Series>,
}

impl<K: Ord> Default for SeriesTable<K> {
    fn default() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> SeriesTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, series: Series) -> Option<Series> {
        self.series.insert(key, series)
    }

    pub fn get(&self, key: &K) -> Option<&Series> {
        self.series.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.series.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Series)> {
        self.series.iter()
    }

    /// Applies `f` to every series independently.
    pub fn map_series<F>(&self, mut f: F) -> SeriesTable<K>
    where
        F: FnMut(&K, &Series) -> Series,
    {
        SeriesTable {
            series: self
                .series
                .iter()
                .map(|(key, series)| (key.clone(), f(key, series)))
                .collect(),
        }
    }

    pub fn filter<F>(&self, mut keep: F) -> SeriesTable<K>
    where
        F: FnMut(&K, &Series) -> bool,
    {
        SeriesTable {
            series: self
                .series
                .iter()
                .filter(|(key, series)| keep(key, series))
                .map(|(key, series)| (key.clone(), series.clone()))
                .collect(),
        }
    }

    pub fn group_by<G, F>(&self, mut group_of: F) -> BTreeMap<G, SeriesTable<K>>
    where
        G: Ord,
        F: FnMut(&K) -> G,
    {
        let mut groups: BTreeMap<G, SeriesTable<K>> = BTreeMap::new();
        for (key, series) in &self.series {
            groups
                .entry(group_of(key))
                .or_default()
                .insert(key.clone(), series.clone());
        }
        groups
    }

    /// Earliest and latest year covered by any non-empty series.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        self.series
            .values()
            .filter(|series| !series.is_empty())
            .fold(None, |span, series| {
                let (first, last) = (series.first_year(), series.last_year());
                Some(match span {
                    None => (first, last),
                    Some((lo, hi)) => (lo.min(first), hi.max(last)),
                })
            })
    }

    /// Per-year arithmetic mean over all series with a value that year.
    pub fn mean_chronology(&self) -> MeanChronology {
        let Some((first_year, last_year)) = self.year_span() else {
            return MeanChronology::default();
        };

        let mut values = Vec::with_capacity((last_year - first_year + 1) as usize);
        let mut sample_depth = Vec::with_capacity(values.capacity());
        for year in first_year..=last_year {
            let present: Vec<f64> = self
                .series
                .values()
                .filter_map(|series| series.get(year))
                .collect();
            sample_depth.push(present.len());
            values.push(crate::numerics::mean(&present));
        }

        MeanChronology {
            series: Series::new(first_year, values),
            sample_depth,
        }
    }
}

impl<K: Ord> FromIterator<(K, Series)> for SeriesTable<K> {
    fn from_iter<I: IntoIterator<Item = (K, Series)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Series, SeriesError, SeriesTable};

    #[test]
    fn from_pairs_fills_gaps_with_missing_values() {
        let series = Series::from_pairs([(2001, 1.0), (1999, 3.0), (2002, f64::NAN)])
            .expect("series should build");

        assert_eq!(series.first_year(), 1999);
        assert_eq!(series.last_year(), 2002);
        assert_eq!(series.values(), &[Some(3.0), None, Some(1.0), None]);
        assert_eq!(series.valid_range(), Some((1999, 2001)));
        assert_eq!(series.count_present(), 2);
    }

    #[test]
    fn from_pairs_rejects_duplicate_years() {
        let error = Series::from_pairs([(2000, 1.0), (2000, 2.0)])
            .expect_err("duplicate year should fail");
        assert_eq!(error, SeriesError::DuplicateYear { year: 2000 });
    }

    #[test]
    fn get_and_restrict_respect_year_bounds() {
        let series = Series::from_values(2000, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(series.get(1999), None);
        assert_eq!(series.get(2002), Some(3.0));
        assert_eq!(series.get(2010), None);

        let tail = series.restrict_from(2002);
        assert_eq!(tail.first_year(), 2002);
        assert_eq!(tail.values(), &[Some(3.0), Some(4.0)]);

        let padded = series.restrict(1998, 2000);
        assert_eq!(padded.values(), &[None, None, Some(1.0)]);
    }

    #[test]
    fn mean_chronology_tracks_sample_depth() {
        let table: SeriesTable<&str> = [
            ("a", Series::from_values(2000, &[1.0, 2.0, 3.0])),
            ("b", Series::from_values(2001, &[4.0, 6.0])),
        ]
        .into_iter()
        .collect();

        let chronology = table.mean_chronology();
        assert_eq!(chronology.series.first_year(), 2000);
        assert_eq!(
            chronology.series.values(),
            &[Some(1.0), Some(3.0), Some(4.5)]
        );
        assert_eq!(chronology.sample_depth, vec![1, 2, 2]);
    }

    #[test]
    fn group_by_partitions_without_losing_series() {
        let table: SeriesTable<(u8, u8)> = [
            ((1, 1), Series::from_values(2000, &[1.0])),
            ((1, 2), Series::from_values(2000, &[2.0])),
            ((2, 1), Series::from_values(2000, &[3.0])),
        ]
        .into_iter()
        .collect();

        let groups = table.group_by(|key| key.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&1].len(), 2);
        assert_eq!(groups[&2].len(), 1);
    }
}
