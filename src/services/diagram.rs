use anyhow::{Result, bail};

use crate::models::render::DiagramView;

/// Header keywords of the mermaid diagram types we pass on to the client
const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram-v2",
    "stateDiagram",
    "erDiagram",
    "gantt",
    "pie",
    "journey",
    "gitGraph",
    "mindmap",
    "timeline",
    "quadrantChart",
    "xychart-beta",
];

/// Identify a mermaid diagram by its header line. Blank lines and `%%` comments
/// before the header are skipped.
pub fn detect_diagram(source: &str) -> Result<DiagramView> {
    let header = source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"));

    let header = match header {
        Some(line) => line,
        None => bail!("diagram is empty"),
    };

    let first_word = header.split_whitespace().next().unwrap_or_default();
    match DIAGRAM_KEYWORDS.iter().find(|k| **k == first_word) {
        Some(keyword) => Ok(DiagramView {
            diagram_type: keyword.to_string(),
            source: source.to_string(),
        }),
        None => bail!("unrecognised diagram type '{}'", first_word),
    }
}
