pub mod ai;
pub mod classifier;
pub mod conversation;
pub mod coordinator;
pub mod diagram;
pub mod executor;
pub mod markdown;
pub mod memory_executor;
pub mod pipeline;
pub mod table_extractor;
pub mod type_inference;
pub mod visualization;

use anyhow::Result;

use crate::models::execution::{ChatContext, ConnectionDescriptor, ExecutionResponse};

// Seams to the external backends
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Answer a question as assistant markdown
    async fn complete(&self, question: &str, context: &ChatContext) -> Result<String>;
}

#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    /// Run SQL against the described connection
    async fn execute(&self, connection: &ConnectionDescriptor, sql: &str) -> Result<ExecutionResponse>;
}

// Re-export the services
pub use ai::AIService;
pub use conversation::ConversationService;
pub use coordinator::QueryExecutionCoordinator;
pub use executor::HttpQueryExecutor;
pub use memory_executor::MemoryQueryExecutor;
