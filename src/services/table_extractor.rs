use log::debug;

use crate::models::dataset::{CellValue, Record, TabularDataset};
use crate::services::markdown::{flatten_text, Node};
use crate::services::type_inference::parse_numeric;

/// Cell text to a typed value: numbers (thousands separators allowed) become numeric,
/// everything else stays text
pub fn coerce_cell(text: &str) -> CellValue {
    match parse_numeric(text) {
        Some(n) => CellValue::Number(n),
        None => CellValue::Text(text.to_string()),
    }
}

/// Turn a `table` node into a dataset.
///
/// Returns `None` when the table has no header group, no header cells, or no data rows.
/// Header and body groups are found by tag, not position. Cells beyond the header count
/// are dropped; duplicate header names keep the last value written.
pub fn extract_table(table: &Node) -> Option<TabularDataset> {
    let head = match table.child_with_tag("thead") {
        Some(head) => head,
        None => {
            debug!("Table has no header group, skipping");
            return None;
        }
    };

    let headers: Vec<String> = head
        .child_with_tag("tr")
        .map(|row| {
            row.children_with_tag("th")
                .map(|cell| flatten_text(cell).trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    if headers.is_empty() {
        debug!("Table header group has no cells, skipping");
        return None;
    }

    let mut dataset = TabularDataset::new(headers);

    if let Some(body) = table.child_with_tag("tbody") {
        for row in body.children_with_tag("tr") {
            let mut record = Record::new();
            for (i, cell) in row.children_with_tag("td").enumerate() {
                if let Some(header) = dataset.headers.get(i) {
                    let text = flatten_text(cell);
                    record.insert(header.clone(), coerce_cell(text.trim()));
                }
            }
            dataset.push_row(record);
        }
    }

    if dataset.is_empty() {
        debug!("Table has no data rows, skipping");
        return None;
    }

    Some(dataset)
}
