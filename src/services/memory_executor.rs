use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::execution::{ConnectionDescriptor, ExecutionResponse};
use crate::services::QueryExecutor;

/// Query executor answering from canned responses, for local development and tests
#[derive(Clone, Debug, Default)]
pub struct MemoryQueryExecutor {
    responses: Arc<Mutex<HashMap<String, ExecutionResponse>>>,
    calls: Arc<Mutex<Vec<String>>>,
    transport_error: Arc<Mutex<Option<String>>>,
}

impl MemoryQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` (compared after trimming) with `response`
    pub fn register(&self, sql: &str, response: ExecutionResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(sql.trim().to_string(), response);
        }
    }

    /// Make every call fail as if the backend were unreachable
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut error) = self.transport_error.lock() {
            *error = Some(message.to_string());
        }
    }

    /// SQL texts received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl QueryExecutor for MemoryQueryExecutor {
    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> Result<ExecutionResponse> {
        log::debug!("Memory executor received query for {} connection", connection.db_type);
        self.calls.lock()
            .map_err(|_| anyhow!("Failed to lock call log"))?
            .push(sql.to_string());

        if let Some(message) = self.transport_error.lock()
            .map_err(|_| anyhow!("Failed to lock transport error"))?
            .clone()
        {
            return Err(anyhow!(message));
        }

        let responses = self.responses.lock()
            .map_err(|_| anyhow!("Failed to lock responses"))?;
        Ok(responses
            .get(sql.trim())
            .cloned()
            .unwrap_or_else(|| ExecutionResponse::error("no canned result for query")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_registered_queries_and_logs_calls() {
        let executor = MemoryQueryExecutor::new();
        executor.register("SELECT 1", ExecutionResponse::rows(vec!["a".into()], vec![]));
        let conn = ConnectionDescriptor::default();

        let hit = executor.execute(&conn, "  SELECT 1\n").await.unwrap();
        assert!(hit.success);
        let miss = executor.execute(&conn, "SELECT 2").await.unwrap();
        assert!(!miss.success);
        assert_eq!(miss.error.as_deref(), Some("no canned result for query"));
        assert_eq!(executor.calls().len(), 2);
    }
}
