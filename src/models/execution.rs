use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::dataset::TabularDataset;

/// How to reach the user's database; passed through to the execution backend untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDescriptor {
    /// Database flavour, e.g. "postgres", "mysql", "mongodb"
    pub db_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Everything the completion backend gets besides the question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    pub connection: Option<ConnectionDescriptor>,
    /// Free-text schema or DDL
    pub schema: Option<String>,
    /// Model identifier; the configured default is used when absent
    pub model: Option<String>,
    /// Per-request credential overriding the configured key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// Wire shape returned by the query execution backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionResponse {
    pub fn rows(columns: Vec<String>, rows: Vec<Value>) -> Self {
        Self {
            success: true,
            columns: Some(columns),
            rows: Some(rows),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: None,
            rows: None,
            error: Some(message.into()),
        }
    }
}

/// Outcome of one executed SQL block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionResult {
    Rows { dataset: TabularDataset },
    Error { message: String },
}

/// Where a message's execution slot currently stands
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    Executing { sql: String },
    Succeeded { sql: String, dataset: TabularDataset },
    Failed { sql: String, message: String },
}

impl ExecutionState {
    pub fn is_executing(&self) -> bool {
        matches!(self, ExecutionState::Executing { .. })
    }

    /// Stored result, if the slot has settled
    pub fn result(&self) -> Option<ExecutionResult> {
        match self {
            ExecutionState::Succeeded { dataset, .. } => Some(ExecutionResult::Rows {
                dataset: dataset.clone(),
            }),
            ExecutionState::Failed { message, .. } => Some(ExecutionResult::Error {
                message: message.clone(),
            }),
            _ => None,
        }
    }

    pub fn dataset(&self) -> Option<&TabularDataset> {
        match self {
            ExecutionState::Succeeded { dataset, .. } => Some(dataset),
            _ => None,
        }
    }
}
