//! Least-loaded dispatch across the workers of a function.
//!
//! Selection reads every candidate's load counter and picks the strictly
//! smallest, ties going to the earliest-registered worker. Counters are
//! updated after the call, so concurrent dispatches may pick the same
//! worker; the skew corrects itself on later rounds.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::registry::ServiceRegistry;
use crate::clients::{OutboundClient, OutboundError};
use crate::orchestration::correlation::{extract_process_id, CorrelationTable};
use crate::storage::keys::load_counter_key;
use crate::storage::{CoordinationStore, StorageError};

/// Errors from dispatching a new process.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No worker registered for function {0}")]
    NoWorkerAvailable(String),

    #[error("Worker {address} unreachable: {source}")]
    WorkerUnreachable {
        address: String,
        #[source]
        source: OutboundError,
    },

    #[error("Worker {address} failed: {source}")]
    WorkerFailed {
        address: String,
        #[source]
        source: OutboundError,
    },

    #[error("Worker {address} replied without a process id")]
    MissingProcessId { address: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub process_id: String,
    pub address: String,
    /// The worker's reply, passed back to the caller unchanged.
    pub response: Value,
}

/// Dispatcher selecting the least-loaded worker of a function.
pub struct LoadBalancer {
    store: Arc<dyn CoordinationStore>,
    registry: Arc<ServiceRegistry>,
    outbound: Arc<dyn OutboundClient>,
    correlation: CorrelationTable,
}

impl LoadBalancer {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        registry: Arc<ServiceRegistry>,
        outbound: Arc<dyn OutboundClient>,
        correlation: CorrelationTable,
    ) -> Self {
        Self {
            store,
            registry,
            outbound,
            correlation,
        }
    }

    /// Pick the worker with the smallest load counter.
    ///
    /// Workers whose counter has vanished (deregistered by a concurrent
    /// failure) are skipped.
    pub async fn select(&self, function_name: &str) -> Result<String, DispatchError> {
        let workers = self.registry.list_workers(function_name).await?;

        let mut least: Option<(String, i64)> = None;
        for address in workers {
            let Some(load) = self.registry.load(&address).await? else {
                debug!(address = %address, "Skipping worker without load counter");
                continue;
            };
            if least.as_ref().map_or(true, |(_, current)| load < *current) {
                least = Some((address, load));
            }
        }

        match least {
            Some((address, load)) => {
                debug!(
                    function = %function_name,
                    address = %address,
                    load = load,
                    "Selected least-loaded worker"
                );
                Ok(address)
            }
            None => {
                warn!(function = %function_name, "No worker registered for function");
                Err(DispatchError::NoWorkerAvailable(function_name.to_string()))
            }
        }
    }

    /// Forward a new-process request to the least-loaded worker.
    ///
    /// One attempt only: an unreachable worker is deregistered and the error
    /// returned; no other worker is tried.
    pub async fn dispatch(
        &self,
        function_name: &str,
        payload: &Value,
    ) -> Result<Dispatched, DispatchError> {
        let address = self.select(function_name).await?;

        let response = match self.outbound.post(&address, payload).await {
            Ok(response) => response,
            Err(e) if e.is_unreachable() => {
                warn!(
                    function = %function_name,
                    address = %address,
                    error = %e,
                    "Worker unreachable"
                );
                self.registry.deregister(function_name, &address).await?;
                return Err(DispatchError::WorkerUnreachable { address, source: e });
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Dispatch failed");
                return Err(DispatchError::WorkerFailed { address, source: e });
            }
        };

        self.adjust_load(&address, 1).await?;

        let Some(process_id) = extract_process_id(&response) else {
            warn!(address = %address, "Worker reply has no process id");
            return Err(DispatchError::MissingProcessId { address });
        };

        self.correlation.record(&process_id, &address).await?;

        Ok(Dispatched {
            process_id,
            address,
            response,
        })
    }

    /// Release one unit of load from a worker. No floor at zero.
    ///
    /// Returns `None` when the worker has been deregistered in the meantime.
    pub async fn finalize(&self, address: &str) -> Result<Option<i64>, StorageError> {
        let load = self.adjust_load(address, -1).await?;
        if let Some(load) = load {
            debug!(address = %address, load = load, "Released worker load");
        }
        Ok(load)
    }

    /// Apply `delta` to a worker's load counter if the counter still exists.
    ///
    /// Only registration creates counters; registration treats an existing
    /// counter as an already-listed worker.
    async fn adjust_load(&self, address: &str, delta: i64) -> Result<Option<i64>, StorageError> {
        let key = load_counter_key(address);
        if !self.store.exists(&key).await? {
            debug!(address = %address, delta = delta, "Worker deregistered, load unchanged");
            return Ok(None);
        }
        Ok(Some(self.store.incr_by(&key, delta).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockOutboundClient, OutboundMethod};
    use crate::storage::MemoryCoordinationStore;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryCoordinationStore>,
        registry: Arc<ServiceRegistry>,
        outbound: Arc<MockOutboundClient>,
        correlation: CorrelationTable,
        balancer: LoadBalancer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryCoordinationStore::new());
        let registry = Arc::new(ServiceRegistry::new(store.clone()));
        let outbound = Arc::new(MockOutboundClient::new());
        let correlation = CorrelationTable::new(store.clone());
        let balancer = LoadBalancer::new(
            store.clone(),
            registry.clone(),
            outbound.clone(),
            correlation.clone(),
        );
        Fixture {
            store,
            registry,
            outbound,
            correlation,
            balancer,
        }
    }

    async fn register_with_load(f: &Fixture, address: &str, load: i64) {
        f.registry.register("convert", address).await.unwrap();
        f.store
            .incr_by(&load_counter_key(address), load)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_select_least_loaded() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 3).await;
        register_with_load(&f, "http://w2:9100", 1).await;
        register_with_load(&f, "http://w3:9100", 2).await;

        assert_eq!(f.balancer.select("convert").await.unwrap(), "http://w2:9100");
    }

    #[tokio::test]
    async fn test_select_ties_go_to_earliest_registered() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 1).await;
        register_with_load(&f, "http://w2:9100", 1).await;
        register_with_load(&f, "http://w3:9100", 5).await;

        for _ in 0..3 {
            assert_eq!(f.balancer.select("convert").await.unwrap(), "http://w1:9100");
        }
    }

    #[tokio::test]
    async fn test_select_without_workers() {
        let f = fixture();
        let result = f.balancer.select("convert").await;
        assert!(matches!(result, Err(DispatchError::NoWorkerAvailable(f)) if f == "convert"));
    }

    #[tokio::test]
    async fn test_select_skips_worker_without_counter() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        register_with_load(&f, "http://w2:9100", 4).await;
        f.store
            .del(&load_counter_key("http://w1:9100"))
            .await
            .unwrap();

        assert_eq!(f.balancer.select("convert").await.unwrap(), "http://w2:9100");
    }

    #[tokio::test]
    async fn test_dispatch_increments_selected_counter_and_records_process() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 3).await;
        register_with_load(&f, "http://w2:9100", 1).await;
        register_with_load(&f, "http://w3:9100", 2).await;
        f.outbound
            .set_response(OutboundMethod::Post, "http://w2:9100", json!({"id": 5}))
            .await;

        let payload = json!({"functionName": "convert", "amount": "5"});
        let dispatched = f.balancer.dispatch("convert", &payload).await.unwrap();

        assert_eq!(dispatched.address, "http://w2:9100");
        assert_eq!(dispatched.process_id, "5");
        assert_eq!(dispatched.response, json!({"id": 5}));
        assert_eq!(f.registry.load("http://w2:9100").await.unwrap(), Some(2));
        assert_eq!(f.registry.load("http://w1:9100").await.unwrap(), Some(3));
        assert_eq!(
            f.correlation.lookup("5").await.unwrap(),
            Some("http://w2:9100".to_string())
        );

        let posts = f.outbound.calls_of(OutboundMethod::Post).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].payload, payload);
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_deregisters_without_retry() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        register_with_load(&f, "http://w2:9100", 1).await;
        f.outbound.set_unreachable("http://w1:9100", true).await;

        let result = f.balancer.dispatch("convert", &json!({})).await;

        assert!(matches!(
            result,
            Err(DispatchError::WorkerUnreachable { ref address, .. }) if address == "http://w1:9100"
        ));
        assert_eq!(
            f.registry.list_workers("convert").await.unwrap(),
            vec!["http://w2:9100"]
        );
        assert!(!f.store.exists("http://w1:9100_mailboxSize").await.unwrap());
        // no second attempt against w2
        assert_eq!(f.outbound.calls().await.len(), 1);
        assert_eq!(f.registry.load("http://w2:9100").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_dispatch_timeout_deregisters() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        f.outbound.set_timing_out("http://w1:9100", true).await;

        let result = f.balancer.dispatch("convert", &json!({})).await;

        assert!(matches!(result, Err(DispatchError::WorkerUnreachable { .. })));
        assert!(f.registry.list_workers("convert").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_status_keeps_worker() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        f.outbound
            .set_failing_status("http://w1:9100", Some(500))
            .await;

        let result = f.balancer.dispatch("convert", &json!({})).await;

        assert!(matches!(result, Err(DispatchError::WorkerFailed { .. })));
        assert_eq!(
            f.registry.list_workers("convert").await.unwrap(),
            vec!["http://w1:9100"]
        );
        assert_eq!(f.registry.load("http://w1:9100").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_dispatch_reply_without_id() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        f.outbound
            .set_response(
                OutboundMethod::Post,
                "http://w1:9100",
                json!({"status": "created"}),
            )
            .await;

        let result = f.balancer.dispatch("convert", &json!({})).await;

        assert!(matches!(result, Err(DispatchError::MissingProcessId { .. })));
        // the call reached the worker, so its load was counted
        assert_eq!(f.registry.load("http://w1:9100").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_finalize_decrements_without_floor() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 1).await;

        assert_eq!(f.balancer.finalize("http://w1:9100").await.unwrap(), Some(0));
        assert_eq!(f.balancer.finalize("http://w1:9100").await.unwrap(), Some(-1));
    }

    #[tokio::test]
    async fn test_finalize_after_deregistration_leaves_no_counter() {
        let f = fixture();
        register_with_load(&f, "http://w1:9100", 0).await;
        f.outbound
            .set_response(OutboundMethod::Post, "http://w1:9100", json!({"id": 0}))
            .await;
        f.balancer.dispatch("convert", &json!({})).await.unwrap();

        f.outbound.set_unreachable("http://w1:9100", true).await;
        assert!(f.balancer.dispatch("convert", &json!({})).await.is_err());
        assert!(f.registry.list_workers("convert").await.unwrap().is_empty());

        // the in-flight process finishes after its worker was dropped
        assert_eq!(f.balancer.finalize("http://w1:9100").await.unwrap(), None);
        assert_eq!(f.registry.load("http://w1:9100").await.unwrap(), None);

        f.outbound.set_unreachable("http://w1:9100", false).await;
        f.registry.register("convert", "http://w1:9100").await.unwrap();
        assert_eq!(
            f.registry.list_workers("convert").await.unwrap(),
            vec!["http://w1:9100"]
        );
        let dispatched = f.balancer.dispatch("convert", &json!({})).await.unwrap();
        assert_eq!(dispatched.address, "http://w1:9100");
        assert_eq!(f.registry.load("http://w1:9100").await.unwrap(), Some(1));
    }
}
