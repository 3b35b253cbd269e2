use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Value;

/// Longest string variable written without very-long-string records
pub const MAX_STRING_WIDTH: usize = 255;

/// Missing value tokens (case-insensitive)
pub const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NULL", "NaN"];

// SAS missing values: "." plus the special missings ".A" through ".Z" and "._"
static SAS_MISSING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.[A-Za-z_]?$").unwrap());

/// Storage class of a column when written to a typed format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    /// String column with its width in bytes
    String(usize),
}

/// Check if a value represents a missing value
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    MISSING_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) || SAS_MISSING.is_match(trimmed)
}

/// Parse a numeric value
pub fn parse_numeric(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Parse a raw text field into a cell
pub fn parse_cell(field: &str) -> Value {
    if is_missing(field) {
        Value::Missing
    } else if let Some(n) = parse_numeric(field) {
        Value::Number(n)
    } else {
        Value::Text(field.to_string())
    }
}

/// Decide how a column is stored: numeric unless any cell is text.
///
/// String widths are the longest rendered cell, at least 1 and at most
/// `MAX_STRING_WIDTH` bytes.
pub fn infer_column_kind(values: &[Value]) -> ColumnKind {
    if !values.iter().any(|v| matches!(v, Value::Text(_))) {
        return ColumnKind::Numeric;
    }

    let width = values
        .iter()
        .map(|v| v.to_string().len())
        .max()
        .unwrap_or(1)
        .clamp(1, MAX_STRING_WIDTH);

    ColumnKind::String(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing() {
        assert!(is_missing(""));
        assert!(is_missing("  "));
        assert!(is_missing("NA"));
        assert!(is_missing("null"));
        assert!(is_missing("."));
        assert!(is_missing(".A"));
        assert!(is_missing("._"));
        assert!(!is_missing("0"));
        assert!(!is_missing(".5"));
        assert!(!is_missing("test"));
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("42"), Some(42.0));
        assert_eq!(parse_numeric(" -3.5 "), Some(-3.5));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("abc"), None);
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("7"), Value::Number(7.0));
        assert_eq!(parse_cell("."), Value::Missing);
        assert_eq!(parse_cell("ann"), Value::Text("ann".to_string()));
    }

    #[test]
    fn test_infer_numeric() {
        let values = vec![Value::from(1.0), Value::Missing, Value::from(2.5)];
        assert_eq!(infer_column_kind(&values), ColumnKind::Numeric);
        assert_eq!(infer_column_kind(&[Value::Missing]), ColumnKind::Numeric);
        assert_eq!(infer_column_kind(&[]), ColumnKind::Numeric);
    }

    #[test]
    fn test_infer_string_width() {
        let values = vec![Value::from("abc"), Value::from(12345.0), Value::Missing];
        assert_eq!(infer_column_kind(&values), ColumnKind::String(5));
        assert_eq!(infer_column_kind(&[Value::from("")]), ColumnKind::String(1));

        let long = "x".repeat(400);
        assert_eq!(
            infer_column_kind(&[Value::from(long.as_str())]),
            ColumnKind::String(MAX_STRING_WIDTH)
        );
    }
}
