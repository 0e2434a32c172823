use std::sync::{Arc, Mutex};
use std::collections::HashMap;
use anyhow::{Result, anyhow};
use log::{info, warn, error};
use uuid::Uuid;

use crate::models::dataset::TabularDataset;
use crate::models::execution::{ChatContext, ConnectionDescriptor, ExecutionState};
use crate::models::message::{Message, Transcript};
use crate::models::render::{RenderedBlock, RenderedMessage};
use crate::services::coordinator::QueryExecutionCoordinator;
use crate::services::pipeline::render_message;
use crate::services::CompletionBackend;

const AI_UNAVAILABLE: &str = "The AI service is not configured. Set OPENAI_API_KEY or pass an API key with the request.";

/// In-memory store for the transcript and the context each answer was given with
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    transcript: Arc<Mutex<Transcript>>,
    contexts: Arc<Mutex<HashMap<Uuid, ChatContext>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the transcript
    pub fn append(&self, message: Message) -> Result<Uuid> {
        let mut transcript = self.transcript.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on transcript"))?;
        Ok(transcript.push(message))
    }

    /// Get a message by ID
    pub fn get(&self, id: Uuid) -> Result<Option<Message>> {
        let transcript = self.transcript.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on transcript"))?;
        Ok(transcript.get(id).cloned())
    }

    pub fn messages(&self) -> Result<Vec<Message>> {
        let transcript = self.transcript.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on transcript"))?;
        Ok(transcript.messages().to_vec())
    }

    pub fn store_context(&self, id: Uuid, context: ChatContext) -> Result<()> {
        let mut contexts = self.contexts.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on contexts"))?;
        contexts.insert(id, context);
        Ok(())
    }

    pub fn context(&self, id: Uuid) -> Result<Option<ChatContext>> {
        let contexts = self.contexts.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on contexts"))?;
        Ok(contexts.get(&id).cloned())
    }
}

/// Owns the conversation: asks the assistant, renders answers and runs their SQL
#[derive(Clone)]
pub struct ConversationService {
    store: InMemoryStore,
    completion: Option<Arc<dyn CompletionBackend>>,
    coordinator: QueryExecutionCoordinator,
}

impl ConversationService {
    pub fn new(
        completion: Option<Arc<dyn CompletionBackend>>,
        coordinator: QueryExecutionCoordinator,
    ) -> Self {
        Self {
            store: InMemoryStore::new(),
            completion,
            coordinator,
        }
    }

    /// Ask a question and return the rendered answer.
    ///
    /// Completion failures become the assistant's text so the transcript stays
    /// append-only. The answer's primary SQL is auto-run when a connection is given.
    pub async fn ask(&self, question: &str, context: ChatContext) -> Result<RenderedMessage> {
        info!("Processing question: {}", question);
        self.store.append(Message::user(question))?;

        let content = match &self.completion {
            Some(backend) => match backend.complete(question, &context).await {
                Ok(answer) => answer,
                Err(e) => {
                    error!("Completion request failed: {}", e);
                    format!("Error: {}", e)
                }
            },
            None => {
                warn!("No completion backend configured");
                AI_UNAVAILABLE.to_string()
            }
        };

        let answer = Message::assistant(content);
        let id = answer.id;
        self.store.store_context(id, context)?;
        self.store.append(answer)?;

        match self.render(id).await? {
            Some(rendered) => Ok(rendered),
            None => Err(anyhow!("Message {} vanished from the transcript", id)),
        }
    }

    /// Render a stored message and give its auto-run a chance to fire.
    ///
    /// Repeated renders of the same message never execute its SQL again.
    pub async fn render(&self, message_id: Uuid) -> Result<Option<RenderedMessage>> {
        let message = match self.store.get(message_id)? {
            Some(message) => message,
            None => return Ok(None),
        };
        let connection = self.store.context(message_id)?.and_then(|c| c.connection);

        let mut rendered = render_message(&message);
        self.coordinator
            .auto_run(message.id, message.role, rendered.auto_run_sql.as_deref(), connection.as_ref())
            .await?;
        rendered.execution = self.coordinator.state(message.id)?;
        Ok(Some(rendered))
    }

    /// User-requested run of any SQL shown in a message
    pub async fn run_manual(
        &self,
        message_id: Uuid,
        sql: &str,
        connection: Option<ConnectionDescriptor>,
    ) -> Result<ExecutionState> {
        if self.store.get(message_id)?.is_none() {
            return Err(anyhow!("Message {} not found", message_id));
        }
        let connection = match connection {
            Some(connection) => connection,
            None => self.store.context(message_id)?
                .and_then(|c| c.connection)
                .ok_or_else(|| anyhow!("No database connection available for this message"))?,
        };
        self.coordinator.run(message_id, sql, &connection).await
    }

    /// Rows from the message's latest successful run
    pub fn execution_dataset(&self, message_id: Uuid) -> Result<Option<TabularDataset>> {
        Ok(self.coordinator.state(message_id)?.dataset().cloned())
    }

    /// Dataset of the `index`-th markdown table in the message, if it extracted cleanly
    pub fn table_dataset(&self, message_id: Uuid, index: usize) -> Result<Option<TabularDataset>> {
        let message = match self.store.get(message_id)? {
            Some(message) => message,
            None => return Ok(None),
        };
        let rendered = render_message(&message);
        Ok(rendered.tables().get(index).and_then(|block| match block {
            RenderedBlock::Table { dataset, .. } => dataset.clone(),
            _ => None,
        }))
    }

    pub fn exists(&self, message_id: Uuid) -> Result<bool> {
        Ok(self.store.get(message_id)?.is_some())
    }

    /// Stop updating a message's view; late results are discarded
    pub fn dismiss(&self, message_id: Uuid) -> Result<()> {
        info!("Tearing down render state for message {}", message_id);
        self.coordinator.teardown(message_id)
    }

    pub fn transcript(&self) -> Result<Vec<Message>> {
        self.store.messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::execution::ExecutionResponse;
    use crate::models::message::Role;
    use crate::services::memory_executor::MemoryQueryExecutor;
    use serde_json::json;

    /// Completion backend replaying a fixed answer or failure
    struct ScriptedCompletion(std::result::Result<String, String>);

    #[async_trait::async_trait]
    impl CompletionBackend for ScriptedCompletion {
        async fn complete(&self, _question: &str, _context: &ChatContext) -> Result<String> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    const TWO_QUERIES: &str = "Top regions:\n\n```sql\nSELECT region, total FROM sales\n```\n\n\
Or just count them:\n\n```sql\nSELECT count(*) FROM sales\n```\n";

    fn service(answer: std::result::Result<&str, &str>) -> (ConversationService, MemoryQueryExecutor) {
        let executor = MemoryQueryExecutor::new();
        executor.register(
            "SELECT region, total FROM sales",
            ExecutionResponse::rows(
                vec!["region".into(), "total".into()],
                vec![json!({"region": "North", "total": 10}), json!({"region": "South", "total": 4})],
            ),
        );
        let completion: Arc<dyn CompletionBackend> =
            Arc::new(ScriptedCompletion(answer.map(str::to_string).map_err(str::to_string)));
        let coordinator = QueryExecutionCoordinator::new(Arc::new(executor.clone()));
        (ConversationService::new(Some(completion), coordinator), executor)
    }

    fn with_connection() -> ChatContext {
        ChatContext {
            connection: Some(ConnectionDescriptor { db_type: "postgres".into(), ..Default::default() }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn only_first_query_auto_runs_and_rerender_does_not_repeat() {
        let (service, executor) = service(Ok(TWO_QUERIES));

        let rendered = service.ask("sales by region?", with_connection()).await.unwrap();
        assert_eq!(executor.calls(), vec!["SELECT region, total FROM sales"]);
        assert_eq!(rendered.execution.dataset().map(|d| d.row_count()), Some(2));

        let again = service.render(rendered.message_id).await.unwrap().unwrap();
        let third = service.render(rendered.message_id).await.unwrap().unwrap();
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(again.execution, rendered.execution);
        assert_eq!(third.execution, rendered.execution);
    }

    #[tokio::test]
    async fn no_connection_means_no_auto_run() {
        let (service, executor) = service(Ok(TWO_QUERIES));
        let rendered = service.ask("sales by region?", ChatContext::default()).await.unwrap();
        assert_eq!(rendered.execution, ExecutionState::Idle);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn completion_failure_becomes_assistant_text() {
        let (service, _) = service(Err("AI API request timed out"));
        let rendered = service.ask("anything", with_connection()).await.unwrap();

        let transcript = service.transcript().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, "Error: AI API request timed out");
        assert_eq!(rendered.auto_run_sql, None);
    }

    #[tokio::test]
    async fn missing_backend_answers_with_notice() {
        let coordinator = QueryExecutionCoordinator::new(Arc::new(MemoryQueryExecutor::new()));
        let service = ConversationService::new(None, coordinator);
        service.ask("hello", ChatContext::default()).await.unwrap();
        assert_eq!(service.transcript().unwrap()[1].content, AI_UNAVAILABLE);
    }

    #[tokio::test]
    async fn manual_run_uses_stored_connection() {
        let (service, executor) = service(Ok(TWO_QUERIES));
        let rendered = service.ask("sales?", with_connection()).await.unwrap();

        let state = service
            .run_manual(rendered.message_id, "SELECT count(*) FROM sales", None)
            .await
            .unwrap();
        assert!(matches!(state, ExecutionState::Failed { .. }));
        assert_eq!(executor.calls().len(), 2);
        assert!(service.execution_dataset(rendered.message_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn markdown_tables_are_addressable_by_index() {
        let (service, _) = service(Ok("| k | v |\n|---|---|\n| a | 1 |\n\n| only | header |\n|---|---|\n"));
        let rendered = service.ask("table?", ChatContext::default()).await.unwrap();

        let first = service.table_dataset(rendered.message_id, 0).unwrap().unwrap();
        assert_eq!(first.headers, vec!["k", "v"]);
        assert!(service.table_dataset(rendered.message_id, 1).unwrap().is_none());
        assert!(service.table_dataset(rendered.message_id, 2).unwrap().is_none());
    }

    #[tokio::test]
    async fn manual_run_without_any_connection_fails() {
        let (service, _) = service(Ok(TWO_QUERIES));
        let rendered = service.ask("sales?", ChatContext::default()).await.unwrap();
        assert!(service.run_manual(rendered.message_id, "SELECT 1", None).await.is_err());
        assert!(service.run_manual(Uuid::new_v4(), "SELECT 1", None).await.is_err());
    }

    #[tokio::test]
    async fn dismissed_message_refuses_further_runs() {
        let (service, executor) = service(Ok(TWO_QUERIES));
        let rendered = service.ask("sales?", with_connection()).await.unwrap();
        service.dismiss(rendered.message_id).unwrap();

        assert!(service
            .run_manual(rendered.message_id, "SELECT region, total FROM sales", None)
            .await
            .is_err());
        service.render(rendered.message_id).await.unwrap();
        assert_eq!(executor.calls().len(), 1);
    }
}
