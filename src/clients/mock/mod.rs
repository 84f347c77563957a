//! Mock outbound client for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{OutboundClient, OutboundError, Result};

/// Which outbound call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundMethod {
    Post,
    Broadcast,
    Put,
    Get,
}

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: OutboundMethod,
    pub address: String,
    /// Request body, or `{"id": ...}` for GET.
    pub payload: Value,
}

/// Mock outbound client with scripted replies and failure injection.
///
/// Unscripted calls answer with an empty JSON object.
#[derive(Default)]
pub struct MockOutboundClient {
    responses: RwLock<HashMap<(OutboundMethod, String), Value>>,
    unreachable: RwLock<HashSet<String>>,
    timing_out: RwLock<HashSet<String>>,
    failing_status: RwLock<HashMap<String, u16>>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl MockOutboundClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply for a method and address.
    pub async fn set_response(&self, method: OutboundMethod, address: &str, response: Value) {
        self.responses
            .write()
            .await
            .insert((method, address.to_string()), response);
    }

    /// Make every call to `address` fail with a connection error.
    pub async fn set_unreachable(&self, address: &str, unreachable: bool) {
        let mut set = self.unreachable.write().await;
        if unreachable {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Make every call to `address` time out.
    pub async fn set_timing_out(&self, address: &str, timing_out: bool) {
        let mut set = self.timing_out.write().await;
        if timing_out {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Make every call to `address` answer with an HTTP error status.
    pub async fn set_failing_status(&self, address: &str, status: Option<u16>) {
        let mut map = self.failing_status.write().await;
        match status {
            Some(code) => {
                map.insert(address.to_string(), code);
            }
            None => {
                map.remove(address);
            }
        }
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Calls of one method made so far, in order.
    pub async fn calls_of(&self, method: OutboundMethod) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    async fn call(&self, method: OutboundMethod, address: &str, payload: Value) -> Result<Value> {
        self.calls.write().await.push(RecordedCall {
            method,
            address: address.to_string(),
            payload,
        });

        if self.unreachable.read().await.contains(address) {
            return Err(OutboundError::Connect {
                address: address.to_string(),
                message: "Mock connection refused".to_string(),
            });
        }
        if self.timing_out.read().await.contains(address) {
            return Err(OutboundError::Timeout {
                address: address.to_string(),
            });
        }
        if let Some(status) = self.failing_status.read().await.get(address) {
            return Err(OutboundError::Status {
                address: address.to_string(),
                status: *status,
            });
        }

        Ok(self
            .responses
            .read()
            .await
            .get(&(method, address.to_string()))
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}

#[async_trait]
impl OutboundClient for MockOutboundClient {
    async fn post(&self, address: &str, payload: &Value) -> Result<Value> {
        self.call(OutboundMethod::Post, address, payload.clone())
            .await
    }

    async fn broadcast(&self, address: &str, payload: &Value) -> Result<Value> {
        self.call(OutboundMethod::Broadcast, address, payload.clone())
            .await
    }

    async fn put(&self, address: &str, payload: &Value) -> Result<Value> {
        self.call(OutboundMethod::Put, address, payload.clone())
            .await
    }

    async fn get(&self, address: &str, process_id: &str) -> Result<Value> {
        self.call(OutboundMethod::Get, address, json!({ "id": process_id }))
            .await
    }
}
