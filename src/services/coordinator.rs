use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use anyhow::{Result, anyhow};
use log::{info, warn, error, debug};
use serde_json::Value;
use uuid::Uuid;

use crate::models::dataset::{CellValue, Record, TabularDataset};
use crate::models::execution::{ConnectionDescriptor, ExecutionResponse, ExecutionState};
use crate::models::message::Role;
use crate::services::QueryExecutor;

/// Per-message execution bookkeeping
#[derive(Debug, Default)]
struct ExecutionSlot {
    /// Set once the automatic run has fired; never cleared
    auto_run_spent: bool,
    /// Bumped on every run; a response only lands if its generation is still current
    generation: u64,
    /// Cleared when the message's view is torn down
    torn_down: bool,
    state: ExecutionState,
}

/// Drives SQL execution for rendered messages: at most one automatic run per message,
/// any number of manual runs, and only the newest run's response is ever applied.
#[derive(Clone)]
pub struct QueryExecutionCoordinator {
    executor: Arc<dyn QueryExecutor>,
    slots: Arc<Mutex<HashMap<Uuid, ExecutionSlot>>>,
}

impl QueryExecutionCoordinator {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut HashMap<Uuid, ExecutionSlot>) -> T) -> Result<T> {
        let mut slots = self.slots.lock()
            .map_err(|_| anyhow!("Failed to acquire lock on execution slots"))?;
        Ok(f(&mut slots))
    }

    /// Current state of a message's slot; `Idle` for messages never run
    pub fn state(&self, message_id: Uuid) -> Result<ExecutionState> {
        self.with_slots(|slots| {
            slots.get(&message_id).map(|s| s.state.clone()).unwrap_or_default()
        })
    }

    /// Whether the automatic run for this message has already fired
    pub fn auto_run_spent(&self, message_id: Uuid) -> Result<bool> {
        self.with_slots(|slots| slots.get(&message_id).map(|s| s.auto_run_spent).unwrap_or(false))
    }

    /// Run the message's primary SQL once, if it qualifies.
    ///
    /// Fires only for assistant messages with a connection and a gate-approved `sql`.
    /// Returns `None` when nothing ran, including every call after the first run fired.
    pub async fn auto_run(
        &self,
        message_id: Uuid,
        role: Role,
        sql: Option<&str>,
        connection: Option<&ConnectionDescriptor>,
    ) -> Result<Option<ExecutionState>> {
        let (sql, connection) = match (role, sql, connection) {
            (Role::Assistant, Some(sql), Some(connection)) => (sql, connection),
            _ => return Ok(None),
        };

        let generation = self.with_slots(|slots| {
            let slot = slots.entry(message_id).or_default();
            if slot.auto_run_spent || slot.torn_down {
                return None;
            }
            slot.auto_run_spent = true;
            Some(Self::begin(slot, sql))
        })?;

        match generation {
            Some(generation) => {
                info!("Auto-running primary query for message {}", message_id);
                self.finish(message_id, generation, sql, connection).await.map(Some)
            }
            None => {
                debug!("Auto-run for message {} already spent, skipping", message_id);
                Ok(None)
            }
        }
    }

    /// User-triggered run. Not subject to the one-shot guard; supersedes any run in flight.
    pub async fn run(
        &self,
        message_id: Uuid,
        sql: &str,
        connection: &ConnectionDescriptor,
    ) -> Result<ExecutionState> {
        let generation = self.with_slots(|slots| {
            let slot = slots.entry(message_id).or_default();
            if slot.torn_down {
                return None;
            }
            Some(Self::begin(slot, sql))
        })?;

        match generation {
            Some(generation) => {
                info!("Manual run for message {} (run #{})", message_id, generation);
                self.finish(message_id, generation, sql, connection).await
            }
            None => Err(anyhow!("Message {} is no longer displayed", message_id)),
        }
    }

    /// Stop applying results to this message; in-flight responses are dropped on arrival
    pub fn teardown(&self, message_id: Uuid) -> Result<()> {
        self.with_slots(|slots| {
            let slot = slots.entry(message_id).or_default();
            slot.torn_down = true;
        })
    }

    fn begin(slot: &mut ExecutionSlot, sql: &str) -> u64 {
        slot.generation += 1;
        slot.state = ExecutionState::Executing { sql: sql.to_string() };
        slot.generation
    }

    async fn finish(
        &self,
        message_id: Uuid,
        generation: u64,
        sql: &str,
        connection: &ConnectionDescriptor,
    ) -> Result<ExecutionState> {
        let outcome = match self.executor.execute(connection, sql).await {
            Ok(response) => settle(sql, response),
            Err(e) => {
                error!("Query execution failed for message {}: {}", message_id, e);
                ExecutionState::Failed {
                    sql: sql.to_string(),
                    message: format!("Failed to execute query: {}", e),
                }
            }
        };

        self.with_slots(|slots| {
            let slot = match slots.get_mut(&message_id) {
                Some(slot) => slot,
                None => return outcome,
            };
            if slot.torn_down {
                debug!("Message {} torn down, dropping result of run #{}", message_id, generation);
                return outcome;
            }
            if slot.generation != generation {
                warn!(
                    "Dropping stale result of run #{} for message {} (latest is #{})",
                    generation, message_id, slot.generation
                );
                return slot.state.clone();
            }
            slot.state = outcome;
            slot.state.clone()
        })
    }
}

/// Map a backend response onto a settled state
fn settle(sql: &str, response: ExecutionResponse) -> ExecutionState {
    match response {
        ExecutionResponse { success: true, columns: Some(columns), rows: Some(rows), .. } => {
            let dataset = rows_to_dataset(columns, &rows);
            info!("Query returned {} rows", dataset.row_count());
            ExecutionState::Succeeded { sql: sql.to_string(), dataset }
        }
        ExecutionResponse { success: true, .. } => ExecutionState::Failed {
            sql: sql.to_string(),
            message: "Query returned no result set".to_string(),
        },
        ExecutionResponse { error, .. } => {
            let message = error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "Query execution failed".to_string());
            warn!("Backend rejected query: {}", message);
            ExecutionState::Failed { sql: sql.to_string(), message }
        }
    }
}

/// Backend rows (objects keyed by column, or positional arrays) to a dataset
pub fn rows_to_dataset(columns: Vec<String>, rows: &[Value]) -> TabularDataset {
    let mut dataset = TabularDataset::new(columns);
    for row in rows {
        let mut record = Record::new();
        match row {
            Value::Object(map) => {
                for header in &dataset.headers {
                    if let Some(value) = map.get(header) {
                        record.insert(header.clone(), json_cell(value));
                    }
                }
            }
            Value::Array(values) => {
                for (header, value) in dataset.headers.iter().zip(values) {
                    record.insert(header.clone(), json_cell(value));
                }
            }
            other => warn!("Skipping malformed result row: {}", other),
        }
        dataset.push_row(record);
    }
    dataset
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_else(|| CellValue::Text(n.to_string())),
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Null => CellValue::default(),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}
