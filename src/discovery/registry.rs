//! Service registry - function name to worker address lists, backed by the
//! coordination store.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::storage::keys::{function_key, load_counter_key};
use crate::storage::{parse_integer, CoordinationStore, Result};

/// Registry of workers per function name.
///
/// The worker lists and load counters live in the coordination store and are
/// shared by every gateway. The set of function names this gateway has seen
/// registered is local to the instance and only feeds `broadcast:all`.
pub struct ServiceRegistry {
    store: Arc<dyn CoordinationStore>,
    observed_functions: RwLock<Vec<String>>,
}

impl ServiceRegistry {
    /// Create a registry over a coordination store.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            observed_functions: RwLock::new(Vec::new()),
        }
    }

    /// Register a worker for a function.
    ///
    /// A worker whose load counter already exists is treated as registered and
    /// left untouched; the call still succeeds and returns the address. The
    /// counter is keyed by address only, so a known address registering for a
    /// second function is not added to that function's list.
    pub async fn register(&self, function_name: &str, address: &str) -> Result<String> {
        let counter_key = load_counter_key(address);

        if self.store.exists(&counter_key).await? {
            debug!(
                function = %function_name,
                address = %address,
                "Worker already registered"
            );
        } else {
            self.store
                .lpush(&function_key(function_name), address)
                .await?;
            self.store.set(&counter_key, "0").await?;
            info!(
                function = %function_name,
                address = %address,
                "Registered worker"
            );
        }

        self.observe(function_name).await;
        Ok(address.to_string())
    }

    /// Workers registered for a function, earliest-registered first.
    pub async fn list_workers(&self, function_name: &str) -> Result<Vec<String>> {
        let key = function_key(function_name);
        let len = self.store.llen(&key).await?;
        if len == 0 {
            return Ok(Vec::new());
        }

        // lpush puts the newest worker at the head
        let mut workers = self.store.lrange(&key, 0, len as isize - 1).await?;
        workers.reverse();
        Ok(workers)
    }

    /// Remove one occurrence of a worker and drop its load counter.
    pub async fn deregister(&self, function_name: &str, address: &str) -> Result<()> {
        let removed = self
            .store
            .lrem(&function_key(function_name), 1, address)
            .await?;
        self.store.del(&load_counter_key(address)).await?;

        warn!(
            function = %function_name,
            address = %address,
            removed = removed,
            "Deregistered worker"
        );
        Ok(())
    }

    /// Current load counter of a worker, `None` when it is not registered.
    pub async fn load(&self, address: &str) -> Result<Option<i64>> {
        let key = load_counter_key(address);
        match self.store.get(&key).await? {
            Some(value) => Ok(Some(parse_integer(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Function names this gateway has seen registered, in first-seen order.
    pub async fn observed_functions(&self) -> Vec<String> {
        self.observed_functions.read().await.clone()
    }

    async fn observe(&self, function_name: &str) {
        let mut observed = self.observed_functions.write().await;
        if !observed.iter().any(|f| f == function_name) {
            observed.push(function_name.to_string());
        }
    }
}
