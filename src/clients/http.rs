//! HTTP outbound client.
//!
//! Sends JSON requests to workers with a bounded per-request timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use super::{OutboundClient, OutboundError, Result};

/// Header marking a request as coming from the gateway's broadcast fan-out.
pub const SERVICE_CALL_HEADER: &str = "Service-Call";
/// Value of `SERVICE_CALL_HEADER` on broadcast deliveries.
pub const BROADCAST_DELIVERY: &str = "broadcast";

/// Outbound client backed by `reqwest`.
#[derive(Clone)]
pub struct HttpOutboundClient {
    client: Client,
}

impl HttpOutboundClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutboundError::Connect {
                address: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Map a transport error onto the outbound taxonomy.
    fn classify(address: &str, err: reqwest::Error) -> OutboundError {
        if err.is_timeout() {
            OutboundError::Timeout {
                address: address.to_string(),
            }
        } else if let Some(status) = err.status() {
            OutboundError::Status {
                address: address.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            OutboundError::Decode {
                address: address.to_string(),
                message: err.to_string(),
            }
        } else {
            // connect errors, unparseable addresses, broken connections
            OutboundError::Connect {
                address: address.to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn send(&self, address: &str, request: RequestBuilder) -> Result<Value> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Self::classify(address, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(address = %address, status = %status, "Worker returned error status");
            return Err(OutboundError::Status {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(address, e))?;

        debug!(address = %address, bytes = body.len(), "Worker replied");

        serde_json::from_str(&body).map_err(|e| OutboundError::Decode {
            address: address.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl OutboundClient for HttpOutboundClient {
    async fn post(&self, address: &str, payload: &Value) -> Result<Value> {
        self.send(address, self.client.post(address).json(payload))
            .await
    }

    async fn broadcast(&self, address: &str, payload: &Value) -> Result<Value> {
        let request = self
            .client
            .post(address)
            .header(SERVICE_CALL_HEADER, BROADCAST_DELIVERY)
            .json(payload);
        self.send(address, request).await
    }

    async fn put(&self, address: &str, payload: &Value) -> Result<Value> {
        self.send(address, self.client.put(address).json(payload))
            .await
    }

    async fn get(&self, address: &str, process_id: &str) -> Result<Value> {
        let request = self.client.get(address).query(&[("id", process_id)]);
        self.send(address, request).await
    }
}
