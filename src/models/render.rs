use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::dataset::{ColumnTypeMap, TabularDataset};
use crate::models::execution::ExecutionState;
use crate::models::message::Role;

/// A fenced block as found in the markdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeBlock {
    /// Language annotation after the opening fence, if any
    pub language: Option<String>,
    /// Block body
    pub text: String,
}

impl CodeBlock {
    pub fn new(language: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            language: language.map(str::to_string),
            text: text.into(),
        }
    }
}

/// What a fenced block is, judged by its language tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Sql,
    Diagram,
    Generic,
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedBlock {
    pub block: CodeBlock,
    pub kind: BlockKind,
}

/// Coarse SQL complexity tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    Simple,
    Intermediate,
    Complex,
}

/// Style tag for a highlighted span of SQL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StyleTag {
    Keyword,
    Function,
    String,
    Number,
    Comment,
    Operator,
    Identifier,
    Whitespace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightSpan {
    pub style: StyleTag,
    pub text: String,
}

/// A recognised diagram block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagramView {
    /// Diagram keyword from the header line, e.g. "flowchart"
    pub diagram_type: String,
    pub source: String,
}

/// One renderable piece of an assistant message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderedBlock {
    /// Markdown prose with code and tables removed
    Prose { text: String },
    Code {
        kind: BlockKind,
        language: Option<String>,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        complexity: Option<Complexity>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        highlighted: Vec<HighlightSpan>,
        /// Whether this block is the one auto-run for the message
        auto_run: bool,
    },
    Diagram {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagram: Option<DiagramView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    Table {
        #[serde(skip_serializing_if = "Option::is_none")]
        dataset: Option<TabularDataset>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column_types: Option<ColumnTypeMap>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
}

/// View model for a whole message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedMessage {
    pub message_id: Uuid,
    pub role: Role,
    pub blocks: Vec<RenderedBlock>,
    /// Text of the first sql block when it passed the safety gate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_run_sql: Option<String>,
    pub execution: ExecutionState,
}

impl RenderedMessage {
    /// All code blocks of the given kind, in document order
    pub fn code_blocks(&self, wanted: BlockKind) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                RenderedBlock::Code { kind, text, .. } if *kind == wanted => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<&RenderedBlock> {
        self.blocks
            .iter()
            .filter(|b| matches!(b, RenderedBlock::Table { .. }))
            .collect()
    }
}
