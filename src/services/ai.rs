use std::time::Duration;
use anyhow::{Result, anyhow};
use log::{info, error, debug};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::models::execution::ChatContext;
use crate::services::CompletionBackend;

const SYSTEM_PROMPT: &str = "You are a database assistant that turns questions into SQL. \
Put the main query first, in a fenced ```sql block (```mongodb for MongoDB). \
Only the first block may be run automatically, so make it a read-only SELECT or WITH query. \
Use ```mermaid blocks for diagrams and markdown tables for small result previews. \
Keep explanations short.";

/// Client for an OpenAI-compatible chat completions endpoint
#[derive(Clone, Debug)]
pub struct AIService {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    default_model: String,
}

impl AIService {
    /// Create a new AIService using Config
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.backend_timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        match &config.open_ai_key {
            Some(_) => info!("AIService initialized with configured API key"),
            None => info!("OpenAI API key not set in config, requests must carry their own key"),
        }

        Ok(Self {
            client,
            api_key: config.open_ai_key.clone(),
            api_url: config.ai_api_url.clone(),
            default_model: config.ai_model.clone(),
        })
    }

    fn build_messages(&self, question: &str, context: &ChatContext) -> Value {
        let mut system = SYSTEM_PROMPT.to_string();
        if let Some(connection) = &context.connection {
            system.push_str(&format!("\n\nTarget database type: {}.", connection.db_type));
        }
        if let Some(schema) = context.schema.as_deref().filter(|s| !s.trim().is_empty()) {
            system.push_str(&format!("\n\nSchema:\n{}", schema));
        }

        json!([
            { "role": "system", "content": system },
            { "role": "user", "content": question }
        ])
    }
}

#[async_trait::async_trait]
impl CompletionBackend for AIService {
    async fn complete(&self, question: &str, context: &ChatContext) -> Result<String> {
        let api_key = match context.api_key.as_ref().or(self.api_key.as_ref()) {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                error!("No API key available for completion request");
                return Err(anyhow!("No API key configured for the AI service"));
            }
        };

        let model = context.model.clone().unwrap_or_else(|| self.default_model.clone());
        info!("Sending completion request with model: {}", model);

        let request_body = json!({
            "model": model,
            "messages": self.build_messages(question, context),
        });

        let response = match self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Failed to send request to AI API: {}", e);
                    if e.is_timeout() {
                        return Err(anyhow!("AI API request timed out"));
                    } else if e.is_connect() {
                        return Err(anyhow!("Failed to connect to AI API: {}", e));
                    }
                    return Err(anyhow!("Failed to send request to AI API: {}", e));
                }
            };

        let status = response.status();
        info!("AI API response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("AI API error: Status {}, Details: {}", status, error_text);
            return Err(anyhow!("AI API error: Status {}, Details: {}", status, error_text));
        }

        let response_json: Value = response.json().await
            .map_err(|e| anyhow!("Failed to parse AI API response: {}", e))?;
        debug!("AI API response received");

        match response_json["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => {
                error!("Could not extract content from AI response: {:?}", response_json);
                Err(anyhow!("Could not extract content from AI response"))
            }
        }
    }
}
