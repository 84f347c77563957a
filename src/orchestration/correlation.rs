//! Process correlation table.
//!
//! Maps a process id to the worker that owns the process for the lifetime of
//! a POST → PUT* → GET conversation. There is no status field at this layer:
//! an entry exists while the process is routed and is removed when a GET
//! finalizes it. Entries for abandoned processes are never expired.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::storage::keys::process_key;
use crate::storage::{CoordinationStore, Result};

/// Extract the process id a worker assigned, from its JSON reply.
///
/// Workers may send the id as a JSON number or string; both normalize to
/// the same key. Empty strings, nulls and other types are not ids.
pub fn extract_process_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Store-backed `processId → worker address` table.
#[derive(Clone)]
pub struct CorrelationTable {
    store: Arc<dyn CoordinationStore>,
}

impl CorrelationTable {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Route a process to the worker that created it.
    pub async fn record(&self, process_id: &str, address: &str) -> Result<()> {
        self.store.set(&process_key(process_id), address).await?;
        debug!(process_id = %process_id, address = %address, "Process routed");
        Ok(())
    }

    /// Worker owning a process, if it is still in flight.
    pub async fn lookup(&self, process_id: &str) -> Result<Option<String>> {
        self.store.get(&process_key(process_id)).await
    }

    /// Forget a finalized process.
    pub async fn remove(&self, process_id: &str) -> Result<()> {
        self.store.del(&process_key(process_id)).await?;
        debug!(process_id = %process_id, "Process finalized");
        Ok(())
    }
}
