use std::time::Duration;
use anyhow::{Result, anyhow};
use log::{info, error, debug};
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::models::execution::{ConnectionDescriptor, ExecutionResponse};
use crate::services::QueryExecutor;

/// Forwards SQL to the external query execution backend over HTTP
#[derive(Clone, Debug)]
pub struct HttpQueryExecutor {
    client: Client,
    endpoint: String,
}

impl HttpQueryExecutor {
    /// Create an executor when `QUERY_BACKEND_URL` is configured
    pub fn new(config: &Config) -> Result<Option<Self>> {
        match &config.query_backend_url {
            Some(url) if !url.trim().is_empty() => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(config.backend_timeout_secs))
                    .build()
                    .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
                info!("HttpQueryExecutor initialized with endpoint {}", url);
                Ok(Some(Self {
                    client,
                    endpoint: url.clone(),
                }))
            },
            _ => {
                info!("QUERY_BACKEND_URL not set, HttpQueryExecutor not initialized");
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> Result<ExecutionResponse> {
        info!("Sending query to execution backend ({} connection)", connection.db_type);
        debug!("Query text: {}", sql);

        let response = match self.client
            .post(&self.endpoint)
            .json(&json!({ "connection": connection, "sql": sql }))
            .send()
            .await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Failed to reach execution backend: {}", e);
                    if e.is_timeout() {
                        return Err(anyhow!("Execution backend timed out"));
                    }
                    return Err(anyhow!("Failed to reach execution backend: {}", e));
                }
            };

        let status = response.status();
        let body = response.text().await
            .map_err(|e| anyhow!("Failed to read execution backend response: {}", e))?;

        // error statuses may still carry a {success: false, error} payload
        match serde_json::from_str::<ExecutionResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                error!("Execution backend error: Status {}, Details: {}", status, body);
                Err(anyhow!("Execution backend error: Status {}, Details: {}", status, body))
            },
            Err(e) => {
                error!("Failed to parse execution backend response: {}", e);
                Err(anyhow!("Failed to parse execution backend response: {}", e))
            }
        }
    }
}
