//! Column normalization for raw dataset cells.
//!
//! Every cell that reaches the corpus is one of: string, integer, float or an
//! explicit unknown. Rules are chosen per column in `config.yaml`:
//!
//! - `year`: first 4-digit run (`"(2008)"` -> 2008)
//! - `duration`: strips a trailing `" min"` (`"126 min"` -> 126)
//! - `score`: `"****"` placeholder is unknown
//! - `gross`: `"$318.41M"` -> 318.41, `"$2.79B"` -> 2790.0 (millions)
//! - `drop`: column is removed from the schema
//! - `text`: kept verbatim
//! - `auto`: integer, then float, then text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::corpus::AttrValue;

static YEAR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}").expect("Failed to compile year regex"));

static NON_NUMERIC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\d.]").expect("Failed to compile numeric regex"));

/// Placeholder used by the source dataset for a missing score.
const SCORE_PLACEHOLDER: &str = "****";

/// Unit suffix on watch-time cells.
const DURATION_SUFFIX: &str = " min";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Auto,
    Text,
    Year,
    Duration,
    Score,
    Gross,
    Drop,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    #[serde(default)]
    pub kind: ColumnKind,

    /// Schema name for the cleaned column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

impl ColumnRule {
    pub fn new(kind: ColumnKind, rename: Option<&str>) -> Self {
        Self {
            kind,
            rename: rename.map(str::to_string),
        }
    }
}

/// Headers of a leading row-number column written by dataframe exports.
pub fn is_index_column(header: &str) -> bool {
    header.trim().is_empty() || header.starts_with("Unnamed: ")
}

/// Normalize one raw cell according to `kind`.
///
/// Returns `None` only for [`ColumnKind::Drop`].
pub fn clean_cell(kind: ColumnKind, raw: &str) -> Option<AttrValue> {
    let value = match kind {
        ColumnKind::Drop => return None,
        ColumnKind::Text => {
            if raw.is_empty() {
                AttrValue::Unknown
            } else {
                AttrValue::Text(raw.to_string())
            }
        }
        ColumnKind::Auto => infer(raw.trim()),
        ColumnKind::Year => extract_year(raw),
        ColumnKind::Duration => clean_duration(raw),
        ColumnKind::Score => clean_score(raw),
        ColumnKind::Gross => parse_gross(raw),
    };

    Some(value)
}

fn infer(raw: &str) -> AttrValue {
    if raw.is_empty() {
        return AttrValue::Unknown;
    }
    if let Ok(int) = raw.parse::<i64>() {
        return AttrValue::Integer(int);
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() => AttrValue::Float(float),
        _ => AttrValue::Text(raw.to_string()),
    }
}

fn extract_year(raw: &str) -> AttrValue {
    YEAR_REGEX
        .find(raw)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(AttrValue::Integer)
        .unwrap_or(AttrValue::Unknown)
}

fn clean_duration(raw: &str) -> AttrValue {
    let trimmed = raw.trim();
    let minutes = trimmed.strip_suffix(DURATION_SUFFIX).unwrap_or(trimmed);
    minutes
        .trim()
        .parse::<i64>()
        .map(AttrValue::Integer)
        .unwrap_or(AttrValue::Unknown)
}

fn clean_score(raw: &str) -> AttrValue {
    let trimmed = raw.trim();
    if trimmed == SCORE_PLACEHOLDER {
        return AttrValue::Unknown;
    }
    match infer(trimmed) {
        AttrValue::Text(_) => AttrValue::Unknown,
        value => value,
    }
}

fn parse_gross(raw: &str) -> AttrValue {
    let trimmed = raw.trim();
    if !trimmed.starts_with('$') {
        return AttrValue::Unknown;
    }

    let multiplier = if trimmed.contains('B') {
        1000.0
    } else if trimmed.contains('M') {
        1.0
    } else {
        return AttrValue::Unknown;
    };

    match NON_NUMERIC_REGEX.replace_all(trimmed, "").parse::<f64>() {
        Ok(amount) if (amount * multiplier).is_finite() => AttrValue::Float(amount * multiplier),
        _ => AttrValue::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_decorated_cell() {
        assert_eq!(clean_cell(ColumnKind::Year, "(2008)"), Some(AttrValue::Integer(2008)));
        assert_eq!(clean_cell(ColumnKind::Year, "(I) (2019)"), Some(AttrValue::Integer(2019)));
        assert_eq!(clean_cell(ColumnKind::Year, "unknown"), Some(AttrValue::Unknown));
    }

    #[test]
    fn test_duration_strips_minutes() {
        assert_eq!(clean_cell(ColumnKind::Duration, "126 min"), Some(AttrValue::Integer(126)));
        assert_eq!(clean_cell(ColumnKind::Duration, ""), Some(AttrValue::Unknown));
    }

    #[test]
    fn test_score_placeholder_is_unknown() {
        assert_eq!(clean_cell(ColumnKind::Score, "****"), Some(AttrValue::Unknown));
        assert_eq!(clean_cell(ColumnKind::Score, " 79 "), Some(AttrValue::Integer(79)));
        assert_eq!(clean_cell(ColumnKind::Score, "n/a"), Some(AttrValue::Unknown));
    }

    #[test]
    fn test_gross_millions_and_billions() {
        assert_eq!(clean_cell(ColumnKind::Gross, "$318.41M"), Some(AttrValue::Float(318.41)));

        match clean_cell(ColumnKind::Gross, "$2.79B") {
            Some(AttrValue::Float(v)) => assert!((v - 2790.0).abs() < 1e-9),
            other => panic!("unexpected value: {other:?}"),
        }

        assert_eq!(clean_cell(ColumnKind::Gross, "318.41"), Some(AttrValue::Unknown));
        assert_eq!(clean_cell(ColumnKind::Gross, "$1200"), Some(AttrValue::Unknown));
    }

    #[test]
    fn test_gross_overflow_is_unknown() {
        let huge = format!("${}M", "9".repeat(400));
        assert_eq!(clean_cell(ColumnKind::Gross, &huge), Some(AttrValue::Unknown));

        let huge_billions = format!("${}B", "9".repeat(306));
        assert_eq!(clean_cell(ColumnKind::Gross, &huge_billions), Some(AttrValue::Unknown));
    }

    #[test]
    fn test_auto_inference() {
        assert_eq!(clean_cell(ColumnKind::Auto, "42"), Some(AttrValue::Integer(42)));
        assert_eq!(clean_cell(ColumnKind::Auto, "8.1"), Some(AttrValue::Float(8.1)));
        assert_eq!(
            clean_cell(ColumnKind::Auto, "Action, Sci-Fi"),
            Some(AttrValue::Text("Action, Sci-Fi".to_string()))
        );
        assert_eq!(clean_cell(ColumnKind::Auto, "  "), Some(AttrValue::Unknown));
        assert_eq!(
            clean_cell(ColumnKind::Auto, "NaN"),
            Some(AttrValue::Text("NaN".to_string()))
        );
    }

    #[test]
    fn test_drop_yields_none() {
        assert_eq!(clean_cell(ColumnKind::Drop, "1,234"), None);
    }

    #[test]
    fn test_index_column_detection() {
        assert!(is_index_column(""));
        assert!(is_index_column("Unnamed: 0"));
        assert!(!is_index_column("Genre"));
    }
}
