use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const VALUE_PRECISION: usize = 6;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

/// Empty cell for a missing value, fixed decimals otherwise.
pub fn format_optional(value: Option<f64>, precision: usize) -> String {
    value
        .filter(|value| value.is_finite())
        .map(|value| format_fixed_f64(value, 0, precision))
        .unwrap_or_default()
}

pub fn format_optional_int<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Header plus string cells, rendered in row order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> Result<String, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|error| csv::Error::from(error.into_error()))?;
        String::from_utf8(bytes)
            .map_err(|error| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, error)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactWriteError {
    #[error("failed to render '{}': {source}", path.display())]
    Render { path: PathBuf, source: csv::Error },
    #[error("failed to write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub fn write_csv_artifact(path: &Path, table: &CsvTable) -> Result<(), ArtifactWriteError> {
    let content = table.render().map_err(|source| ArtifactWriteError::Render {
        path: path.to_path_buf(),
        source,
    })?;
    write_text_artifact(path, &content).map_err(|source| ArtifactWriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CsvTable, format_fixed_f64, format_optional, format_optional_int, normalize_text_artifact,
        write_csv_artifact, write_text_artifact,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        let first = format_fixed_f64(1.23, 13, 5);
        let second = format_fixed_f64(1.23, 13, 5);

        assert_eq!(first, "      1.23000");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_and_non_finite_values_render_as_empty_cells() {
        assert_eq!(format_optional(Some(0.5), 3), "0.500");
        assert_eq!(format_optional(Some(-12.26), 1), "-12.3");
        assert_eq!(format_optional(None, 3), "");
        assert_eq!(format_optional(Some(f64::NAN), 3), "");
        assert_eq!(format_optional_int(Some(1998)), "1998");
        assert_eq!(format_optional_int::<i32>(None), "");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("artifact.dat");
        let input = "line 1\r\nline 2\rline 3";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"line 1\nline 2\nline 3\n");
    }

    #[test]
    fn csv_tables_quote_only_when_needed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("table.csv");
        let mut table = CsvTable::new(["entity", "reason"]);
        table.push_row(vec!["PS_CC_1_1_1".to_string(), "short, noisy".to_string()]);
        table.push_row(vec!["row 4".to_string(), String::new()]);

        write_csv_artifact(&path, &table).expect("table should be written");
        let written = fs::read_to_string(&path).expect("table should be readable");
        assert_eq!(
            written,
            "entity,reason\nPS_CC_1_1_1,\"short, noisy\"\nrow 4,\n"
        );
    }
}
