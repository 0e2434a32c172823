use lazy_static::lazy_static;
use regex::Regex;

use crate::models::dataset::{CellValue, ColumnType, ColumnTypeMap, TabularDataset};

lazy_static! {
    /// Optional minus, digits and commas, optional fraction. Full match only, so dates
    /// like `2023-01`, exponents and a leading `+` are all rejected.
    static ref NUMERIC_TEXT: Regex = Regex::new(r"^-?[\d,]+(\.\d+)?$").unwrap();
}

/// Parse text as a number under the table rules, stripping thousands separators
pub fn parse_numeric(text: &str) -> Option<f64> {
    if !NUMERIC_TEXT.is_match(text) {
        return None;
    }
    text.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

pub fn is_finite_numeric(value: &CellValue) -> bool {
    as_number(value).is_some()
}

/// Numeric reading of a cell, if it has one
pub fn as_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) => None,
        CellValue::Text(text) => parse_numeric(text),
    }
}

/// Type each column from the first row's value alone.
///
/// Later rows are never consulted: a column whose first value is text stays text even
/// if every other value is a number. With no rows every column is text.
pub fn infer_column_types(dataset: &TabularDataset) -> ColumnTypeMap {
    let first = dataset.rows.first();
    ColumnTypeMap::from_pairs(dataset.headers.iter().map(|header| {
        let numeric = first
            .and_then(|row| row.get(header))
            .map(is_finite_numeric)
            .unwrap_or(false);
        let column_type = if numeric { ColumnType::Numeric } else { ColumnType::Text };
        (header.clone(), column_type)
    }))
}
