use serde::{Deserialize, Serialize};

use crate::models::execution::{ChatContext, ConnectionDescriptor};
use crate::services::visualization::{ChartView, ViewMode};

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's natural language question
    pub question: String,
    pub connection: Option<ConnectionDescriptor>,
    /// Free-text schema or DDL for the assistant
    pub schema: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl ChatRequest {
    pub fn context(&self) -> ChatContext {
        ChatContext {
            connection: self.connection.clone(),
            schema: self.schema.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// Body of `POST /messages/{id}/run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub sql: String,
    /// Falls back to the connection the message was answered with
    pub connection: Option<ConnectionDescriptor>,
}

/// Query string of the chart endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartQuery {
    #[serde(default)]
    pub mode: ViewMode,
    /// Index of a markdown table in the message; the query result when absent
    pub table: Option<usize>,
}

/// Query string of the export endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportQuery {
    pub table: Option<usize>,
}

/// Body returned by `GET /messages/{id}/chart`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub view: ChartView,
    pub available_modes: Vec<ViewMode>,
    /// `data:image/svg+xml;base64,...` for bar and pie views
    pub image: Option<String>,
    /// Why `image` is missing when the chart could not be drawn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}
