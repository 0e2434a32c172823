use log::debug;

use crate::models::execution::ExecutionState;
use crate::models::message::{Message, Role};
use crate::models::render::{BlockKind, CodeBlock, RenderedBlock, RenderedMessage};
use crate::services::classifier::{classify_block, complexity, highlight_sql, is_auto_run_eligible};
use crate::services::diagram::detect_diagram;
use crate::services::markdown::{flatten_text, parse, Node};
use crate::services::table_extractor::extract_table;
use crate::services::type_inference::infer_column_types;

pub const TABLE_FALLBACK_NOTICE: &str = "Unable to display table data";
pub const DIAGRAM_FALLBACK_NOTICE: &str = "Unable to render diagram";

/// Turn a message's markdown into renderable blocks.
///
/// Pure: execution state is always `Idle` here; the conversation layer overlays the
/// coordinator's state.
pub fn render_message(message: &Message) -> RenderedMessage {
    let root = parse(&message.content);
    let mut renderer = BlockRenderer {
        role: message.role,
        blocks: Vec::new(),
        prose: Vec::new(),
        first_sql_seen: false,
        auto_run_sql: None,
    };
    for child in root.children() {
        renderer.visit(child);
    }
    renderer.flush_prose();

    debug!("Rendered message {} into {} blocks", message.id, renderer.blocks.len());
    RenderedMessage {
        message_id: message.id,
        role: message.role,
        blocks: renderer.blocks,
        auto_run_sql: renderer.auto_run_sql,
        execution: ExecutionState::Idle,
    }
}

struct BlockRenderer {
    role: Role,
    blocks: Vec<RenderedBlock>,
    prose: Vec<String>,
    first_sql_seen: bool,
    auto_run_sql: Option<String>,
}

impl BlockRenderer {
    fn visit(&mut self, node: &Node) {
        match node.tag() {
            Some("pre") => {
                self.flush_prose();
                if let Some(code) = node.child_with_tag("code") {
                    self.code(code);
                }
            }
            Some("table") => {
                self.flush_prose();
                self.table(node);
            }
            _ if contains_block(node) => {
                for child in node.children() {
                    self.visit(child);
                }
            }
            _ => {
                let text = flatten_text(node);
                if !text.trim().is_empty() {
                    self.prose.push(text.trim().to_string());
                }
            }
        }
    }

    fn flush_prose(&mut self) {
        if !self.prose.is_empty() {
            let text = self.prose.join("\n\n");
            self.prose.clear();
            self.blocks.push(RenderedBlock::Prose { text });
        }
    }

    fn code(&mut self, code: &Node) {
        let text = flatten_text(code);
        let text = text.strip_suffix('\n').unwrap_or(&text).to_string();
        let classified = classify_block(CodeBlock::new(code.attr("lang"), text));
        let CodeBlock { language, text } = classified.block;

        let block = match classified.kind {
            BlockKind::Sql => {
                let mut auto_run = false;
                if !self.first_sql_seen {
                    self.first_sql_seen = true;
                    if self.role == Role::Assistant && is_auto_run_eligible(&text) {
                        auto_run = true;
                        self.auto_run_sql = Some(text.clone());
                    }
                }
                RenderedBlock::Code {
                    kind: BlockKind::Sql,
                    language,
                    complexity: Some(complexity(&text)),
                    highlighted: highlight_sql(&text),
                    text,
                    auto_run,
                }
            }
            BlockKind::Diagram => match detect_diagram(&text) {
                Ok(diagram) => RenderedBlock::Diagram {
                    source: text,
                    diagram: Some(diagram),
                    notice: None,
                },
                Err(e) => {
                    debug!("Diagram block not recognised: {}", e);
                    RenderedBlock::Diagram {
                        source: text,
                        diagram: None,
                        notice: Some(DIAGRAM_FALLBACK_NOTICE.to_string()),
                    }
                }
            },
            kind => RenderedBlock::Code {
                kind,
                language,
                text,
                complexity: None,
                highlighted: Vec::new(),
                auto_run: false,
            },
        };
        self.blocks.push(block);
    }

    fn table(&mut self, table: &Node) {
        let block = match extract_table(table) {
            Some(dataset) => {
                let column_types = infer_column_types(&dataset);
                RenderedBlock::Table {
                    dataset: Some(dataset),
                    column_types: Some(column_types),
                    notice: None,
                }
            }
            None => RenderedBlock::Table {
                dataset: None,
                column_types: None,
                notice: Some(TABLE_FALLBACK_NOTICE.to_string()),
            },
        };
        self.blocks.push(block);
    }
}

/// Whether `node` holds a code block or table somewhere below it
fn contains_block(node: &Node) -> bool {
    node.children()
        .iter()
        .any(|c| matches!(c.tag(), Some("pre") | Some("table")) || contains_block(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::CellValue;
    use crate::models::render::Complexity;

    const ANSWER: &str = "Here are the top customers:\n\n\
```sql\nSELECT name, SUM(total) AS spent FROM orders GROUP BY name\n```\n\n\
A second query you could try:\n\n\
```sql\nSELECT count(*) FROM orders\n```\n\n\
| name | spent |\n|---|---|\n| Ada | 1,200.50 |\n| Bob | 300 |\n\n\
```mermaid\ngraph TD\n  orders --> customers\n```\n\n\
```python\nprint('hi')\n```\n";

    #[test]
    fn dispatches_blocks_in_document_order() {
        let rendered = render_message(&Message::assistant(ANSWER));
        let kinds: Vec<&str> = rendered
            .blocks
            .iter()
            .map(|b| match b {
                RenderedBlock::Prose { .. } => "prose",
                RenderedBlock::Code { kind: BlockKind::Sql, .. } => "sql",
                RenderedBlock::Code { .. } => "code",
                RenderedBlock::Diagram { .. } => "diagram",
                RenderedBlock::Table { .. } => "table",
            })
            .collect();
        assert_eq!(kinds, vec!["prose", "sql", "prose", "sql", "table", "diagram", "code"]);
    }

    #[test]
    fn only_first_sql_block_is_auto_run() {
        let rendered = render_message(&Message::assistant(ANSWER));
        assert_eq!(
            rendered.auto_run_sql.as_deref(),
            Some("SELECT name, SUM(total) AS spent FROM orders GROUP BY name")
        );
        let flags: Vec<bool> = rendered
            .blocks
            .iter()
            .filter_map(|b| match b {
                RenderedBlock::Code { kind: BlockKind::Sql, auto_run, .. } => Some(*auto_run),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn ineligible_first_block_blocks_auto_run_for_the_message() {
        let rendered = render_message(&Message::assistant(
            "```sql\nDELETE FROM orders\n```\n\n```sql\nSELECT 1\n```\n",
        ));
        assert_eq!(rendered.auto_run_sql, None);
        assert_eq!(rendered.code_blocks(BlockKind::Sql), vec!["DELETE FROM orders", "SELECT 1"]);
    }

    #[test]
    fn user_messages_never_auto_run() {
        let rendered = render_message(&Message::user("```sql\nSELECT 1\n```"));
        assert_eq!(rendered.auto_run_sql, None);
    }

    #[test]
    fn sql_blocks_carry_complexity_and_highlighting() {
        let rendered = render_message(&Message::assistant(ANSWER));
        match &rendered.blocks[1] {
            RenderedBlock::Code { complexity, highlighted, .. } => {
                assert_eq!(*complexity, Some(Complexity::Simple));
                assert!(!highlighted.is_empty());
            }
            other => panic!("expected sql block, got {:?}", other),
        }
    }

    #[test]
    fn tables_become_typed_datasets() {
        let rendered = render_message(&Message::assistant(ANSWER));
        match rendered.tables()[0] {
            RenderedBlock::Table { dataset: Some(dataset), column_types: Some(types), .. } => {
                assert_eq!(dataset.value(0, "spent"), Some(&CellValue::Number(1200.5)));
                assert!(types.is_numeric("spent"));
                assert!(!types.is_numeric("name"));
            }
            other => panic!("expected table with data, got {:?}", other),
        }
    }

    #[test]
    fn header_only_table_renders_notice() {
        let rendered = render_message(&Message::assistant("| a | b |\n|---|---|\n"));
        match rendered.tables()[0] {
            RenderedBlock::Table { dataset: None, notice: Some(notice), .. } => {
                assert_eq!(notice, TABLE_FALLBACK_NOTICE);
            }
            other => panic!("expected fallback notice, got {:?}", other),
        }
    }

    #[test]
    fn unknown_diagram_renders_notice() {
        let rendered = render_message(&Message::assistant("```mermaid\nnot a diagram\n```"));
        assert!(matches!(
            &rendered.blocks[0],
            RenderedBlock::Diagram { diagram: None, notice: Some(_), .. }
        ));
    }

    #[test]
    fn blocks_nested_in_lists_are_found() {
        let rendered = render_message(&Message::assistant(
            "1. Run this:\n\n   ```sql\n   SELECT 1\n   ```\n",
        ));
        assert_eq!(rendered.code_blocks(BlockKind::Sql), vec!["SELECT 1"]);
        assert_eq!(rendered.auto_run_sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn untagged_and_unknown_fences_stay_code() {
        let rendered = render_message(&Message::assistant("```\nraw\n```\n\n```rust\nfn main() {}\n```"));
        assert_eq!(rendered.code_blocks(BlockKind::Plain), vec!["raw"]);
        assert_eq!(rendered.code_blocks(BlockKind::Generic), vec!["fn main() {}"]);
    }
}
