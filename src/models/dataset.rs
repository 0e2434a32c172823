use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single typed cell: either a number or the original text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_number(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One data row, keyed by header name
pub type Record = HashMap<String, CellValue>;

/// Headers plus rows, each row holding exactly the header set as keys
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabularDataset {
    /// Column names in declared order
    pub headers: Vec<String>,
    /// Data rows in source order
    pub rows: Vec<Record>,
}

impl TabularDataset {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, filling any header the row lacks with an empty string.
    /// Keys outside the header set are dropped.
    pub fn push_row(&mut self, mut record: Record) {
        record.retain(|key, _| self.headers.contains(key));
        for header in &self.headers {
            record.entry(header.clone()).or_default();
        }
        self.rows.push(record);
    }

    /// Value for `header` in row `index`, if both exist
    pub fn value(&self, index: usize, header: &str) -> Option<&CellValue> {
        self.rows.get(index).and_then(|row| row.get(header))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inferred kind of a column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "text")]
    Text,
}

/// Header -> type, fixed once computed for a dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnTypeMap {
    types: HashMap<String, ColumnType>,
}

impl ColumnTypeMap {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, ColumnType)>) -> Self {
        Self {
            types: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, header: &str) -> Option<ColumnType> {
        self.types.get(header).copied()
    }

    pub fn is_numeric(&self, header: &str) -> bool {
        self.get(header) == Some(ColumnType::Numeric)
    }

    /// Numeric headers, in the order given by `headers`
    pub fn numeric_columns<'a>(&self, headers: &'a [String]) -> Vec<&'a str> {
        headers
            .iter()
            .filter(|h| self.is_numeric(h))
            .map(|h| h.as_str())
            .collect()
    }

    pub fn has_numeric(&self) -> bool {
        self.types.values().any(|t| *t == ColumnType::Numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_fills_missing_headers_with_empty_text() {
        let mut dataset = TabularDataset::new(vec!["name".into(), "amount".into()]);
        let mut record = Record::new();
        record.insert("name".into(), CellValue::text("Widget"));
        record.insert("stray".into(), CellValue::Number(1.0));
        dataset.push_row(record);

        let row = &dataset.rows[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("amount"), Some(&CellValue::text("")));
        assert!(row.get("stray").is_none());
    }

    #[test]
    fn cell_values_display_as_is() {
        assert_eq!(CellValue::Number(1234.5).to_string(), "1234.5");
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::text("2023-01").to_string(), "2023-01");
    }

    #[test]
    fn cell_values_serialize_untagged() {
        let json = serde_json::to_string(&vec![CellValue::Number(1.5), CellValue::text("a")]).unwrap();
        assert_eq!(json, "[1.5,\"a\"]");
    }
}
