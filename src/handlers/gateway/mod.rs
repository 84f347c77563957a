//! Gateway request handling.
//!
//! The [`Gateway`] owns every piece of gateway state: the registry, the
//! dispatcher, the correlation table, the result cache and the broadcast
//! coordinator. It is built once at startup and shared with the HTTP router.
//!
//! Verb routing:
//! - POST with `Service-Call: true`: worker registration
//! - POST with `Service-Call: broadcast:<target>`: broadcast fan-out
//! - other POST: dispatch of a new process
//! - PUT: forwarded to the worker owning the process
//! - GET: cached result, or finalization at the owning worker

pub mod errmsg;
mod error;
mod request;
mod router;


pub use error::GatewayError;
pub(crate) use request::json_body;
pub use request::{GatewayRequest, SERVICE_CALL_HEADER, SERVICE_ORIGIN_HEADER, SERVICE_PORT_HEADER};
pub use router::{router, serve};

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::clients::OutboundClient;
use crate::config::CacheConfig;
use crate::discovery::{LoadBalancer, ServiceRegistry};
use crate::orchestration::{BroadcastCoordinator, BroadcastTarget, CorrelationTable, Originator};
use crate::storage::CoordinationStore;

/// Registration acknowledgement status.
pub const REGISTRATION_STATUS: &str = "successful connection to gateway";

/// Successful gateway reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    Json(Value),
    /// Joined broadcast replies, returned as-is.
    Text(String),
}

impl GatewayReply {
    pub fn into_body(self) -> String {
        match self {
            GatewayReply::Json(value) => value.to_string(),
            GatewayReply::Text(text) => text,
        }
    }
}

/// Gateway state and verb orchestration.
pub struct Gateway {
    registry: Arc<ServiceRegistry>,
    balancer: LoadBalancer,
    correlation: CorrelationTable,
    cache: Option<ResultCache>,
    broadcaster: BroadcastCoordinator,
    outbound: Arc<dyn OutboundClient>,
}

impl Gateway {
    /// Build gateway state over a coordination store and outbound client.
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        outbound: Arc<dyn OutboundClient>,
        cache_config: &CacheConfig,
    ) -> Self {
        let registry = Arc::new(ServiceRegistry::new(store.clone()));
        let correlation = CorrelationTable::new(store.clone());
        let balancer = LoadBalancer::new(
            store.clone(),
            registry.clone(),
            outbound.clone(),
            correlation.clone(),
        );
        let broadcaster = BroadcastCoordinator::new(registry.clone(), outbound.clone());
        let cache = cache_config
            .enabled
            .then(|| ResultCache::new(store.clone()));

        Self {
            registry,
            balancer,
            correlation,
            cache,
            broadcaster,
            outbound,
        }
    }

    /// Handle one classified request.
    pub async fn handle(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        match request {
            GatewayRequest::Register {
                function_name,
                address,
            } => self.register(&function_name, &address).await,
            GatewayRequest::Broadcast {
                target,
                payload,
                originator,
            } => self
                .broadcast(&target, &payload, &originator)
                .await
                .map(GatewayReply::Text),
            GatewayRequest::Dispatch {
                function_name,
                payload,
            } => self.dispatch(&function_name, &payload).await,
            GatewayRequest::Update {
                process_id,
                payload,
            } => self.update(&process_id, &payload).await,
            GatewayRequest::Finalize { process_id } => self.finalize(&process_id).await,
        }
    }

    /// Register a worker and acknowledge it.
    pub async fn register(
        &self,
        function_name: &str,
        address: &str,
    ) -> Result<GatewayReply, GatewayError> {
        let address = self.registry.register(function_name, address).await?;
        Ok(GatewayReply::Json(json!({
            "status": REGISTRATION_STATUS,
            "address": address,
        })))
    }

    /// Start a new process on the least-loaded worker of a function.
    pub async fn dispatch(
        &self,
        function_name: &str,
        payload: &Value,
    ) -> Result<GatewayReply, GatewayError> {
        let dispatched = self.balancer.dispatch(function_name, payload).await?;
        info!(
            function = %function_name,
            process_id = %dispatched.process_id,
            address = %dispatched.address,
            "Process dispatched"
        );
        Ok(GatewayReply::Json(dispatched.response))
    }

    /// Forward a PUT to the worker owning the process.
    ///
    /// The correlation entry is left untouched, and a failed forward never
    /// deregisters the worker.
    pub async fn update(
        &self,
        process_id: &str,
        payload: &Value,
    ) -> Result<GatewayReply, GatewayError> {
        let address = self.owner(process_id).await?;

        let reply = self
            .outbound
            .put(&address, payload)
            .await
            .map_err(|e| {
                warn!(process_id = %process_id, address = %address, error = %e, "PUT forward failed");
                GatewayError::forward_failed("PUT", &address, e)
            })?;

        debug!(process_id = %process_id, address = %address, "PUT forwarded");
        Ok(GatewayReply::Json(reply))
    }

    /// Serve a cached result, or finalize the process at its worker.
    ///
    /// Finalization releases one unit of the worker's load and removes the
    /// correlation entry whether or not the worker's reply carries a result;
    /// only replies with a result are cached.
    pub async fn finalize(&self, process_id: &str) -> Result<GatewayReply, GatewayError> {
        if let Some(cached) = self.cached(process_id).await {
            return Ok(GatewayReply::Json(cached));
        }

        let address = self.owner(process_id).await?;

        let reply = self
            .outbound
            .get(&address, process_id)
            .await
            .map_err(|e| {
                warn!(process_id = %process_id, address = %address, error = %e, "GET forward failed");
                GatewayError::forward_failed("GET", &address, e)
            })?;

        self.balancer.finalize(&address).await?;
        self.correlation.remove(process_id).await?;

        if let Some(cache) = &self.cache {
            if ResultCache::is_cacheable(&reply) {
                if let Err(e) = cache.store(process_id, &reply).await {
                    warn!(process_id = %process_id, error = %e, "Cache store failed");
                }
            }
        }

        info!(process_id = %process_id, address = %address, "Process finalized");
        Ok(GatewayReply::Json(reply))
    }

    /// Fan a payload out to every target worker except the originator.
    pub async fn broadcast(
        &self,
        target: &BroadcastTarget,
        payload: &Value,
        originator: &Originator,
    ) -> Result<String, GatewayError> {
        Ok(self
            .broadcaster
            .broadcast(target, payload, originator)
            .await?)
    }

    /// Registry backing this gateway.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    async fn owner(&self, process_id: &str) -> Result<String, GatewayError> {
        match self.correlation.lookup(process_id).await? {
            Some(address) => Ok(address),
            None => {
                debug!(process_id = %process_id, "Unknown process");
                Err(GatewayError::UnknownProcess(process_id.to_string()))
            }
        }
    }

    /// Cache lookup; a failing cache only costs the hit.
    async fn cached(&self, process_id: &str) -> Option<Value> {
        let cache = self.cache.as_ref()?;
        match cache.lookup(process_id).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(process_id = %process_id, error = %e, "Cache lookup failed");
                None
            }
        }
    }
}
