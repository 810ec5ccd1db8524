use super::{IdScheme, RawIdentifier};
use crate::domain::TreeKey;

pub(crate) const KEY_FIELDS: [&str; 5] = ["species", "forest", "site", "plot", "tree"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("expected {expected} '{separator}'-separated fields, found {actual}")]
    FieldCount {
        expected: usize,
        actual: usize,
        separator: char,
    },
    #[error("identifier has {actual} characters, fixed-width scheme needs more than {required}")]
    TooShort { required: usize, actual: usize },
    #[error("field '{field}' is empty after normalization")]
    EmptyField { field: &'static str },
    #[error("identifier shape does not match the configured scheme")]
    SchemeMismatch,
}

/// Uppercases, drops punctuation and strips leading zeros of purely numeric
/// tokens: `s-03` and `S03` resolve alike, as do `03` and `3`.
pub(crate) fn canonical_token(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = cleaned.trim_start_matches('0');
        return Some(if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        });
    }

    Some(cleaned)
}

pub fn parse_tree_key(
    identifier: &RawIdentifier,
    scheme: &IdScheme,
) -> Result<TreeKey, IdParseError> {
    let fields: Vec<String> = match (identifier, scheme) {
        (RawIdentifier::Composite(raw), IdScheme::Delimited { separator }) => {
            let parts: Vec<&str> = raw.trim().split(*separator).collect();
            if parts.len() != KEY_FIELDS.len() {
                return Err(IdParseError::FieldCount {
                    expected: KEY_FIELDS.len(),
                    actual: parts.len(),
                    separator: *separator,
                });
            }
            parts.into_iter().map(str::to_string).collect()
        }
        (RawIdentifier::Composite(raw), IdScheme::FixedWidth { widths }) => {
            split_fixed_width(raw.trim(), widths)?
        }
        (RawIdentifier::Columns(columns), IdScheme::Columns) => columns.to_vec(),
        _ => return Err(IdParseError::SchemeMismatch),
    };

    let mut canonical = Vec::with_capacity(KEY_FIELDS.len());
    for (field, raw) in KEY_FIELDS.into_iter().zip(&fields) {
        canonical.push(canonical_token(raw).ok_or(IdParseError::EmptyField { field })?);
    }

    let [species, forest, site, plot, tree]: [String; 5] = canonical
        .try_into()
        .map_err(|_| IdParseError::SchemeMismatch)?;
    Ok(TreeKey::new(species, forest, site, plot, tree))
}

fn split_fixed_width(raw: &str, widths: &[usize; 4]) -> Result<Vec<String>, IdParseError> {
    let chars: Vec<char> = raw.chars().collect();
    let required: usize = widths.iter().sum();
    if chars.len() <= required {
        return Err(IdParseError::TooShort {
            required,
            actual: chars.len(),
        });
    }

    let mut fields = Vec::with_capacity(KEY_FIELDS.len());
    let mut offset = 0;
    for width in widths {
        fields.push(chars[offset..offset + width].iter().collect());
        offset += width;
    }
    fields.push(chars[offset..].iter().collect());
    Ok(fields)
}
