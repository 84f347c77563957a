//! Outbound worker clients.
//!
//! The gateway talks to workers (and, for broadcasts, to every worker of a
//! function) through the `OutboundClient` trait. Payloads are JSON values;
//! a call either yields the worker's JSON reply or an `OutboundError`.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpOutboundClient;
pub use mock::{MockOutboundClient, OutboundMethod, RecordedCall};

/// Result type for outbound calls.
pub type Result<T> = std::result::Result<T, OutboundError>;

/// Errors that can occur calling a worker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OutboundError {
    #[error("Connection failed to {address}: {message}")]
    Connect { address: String, message: String },

    #[error("Request to {address} timed out")]
    Timeout { address: String },

    #[error("Worker at {address} answered with status {status}")]
    Status { address: String, status: u16 },

    #[error("Worker at {address} sent an unreadable reply: {message}")]
    Decode { address: String, message: String },
}

impl OutboundError {
    /// Whether the worker could not be reached at all.
    ///
    /// Timeouts count as unreachable: for dispatch both lead to deregistration.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            OutboundError::Connect { .. } | OutboundError::Timeout { .. }
        )
    }
}

/// Client for calls from the gateway to workers.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    /// POST a payload to a worker (dispatch of a new process).
    async fn post(&self, address: &str, payload: &Value) -> Result<Value>;

    /// POST a broadcast payload to a worker, marked as a broadcast delivery.
    async fn broadcast(&self, address: &str, payload: &Value) -> Result<Value>;

    /// PUT a payload to a worker (refinement of an existing process).
    async fn put(&self, address: &str, payload: &Value) -> Result<Value>;

    /// GET the state of a process from a worker (finalization).
    async fn get(&self, address: &str, process_id: &str) -> Result<Value>;
}
