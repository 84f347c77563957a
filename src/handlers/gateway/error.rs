//! Gateway error taxonomy.
//!
//! Every variant is recovered at the request boundary and rendered as a
//! `200` reply with an `{"error": ...}` body. `Display` carries the full
//! detail for logs; [`GatewayError::public_message`] is what callers see.

use serde_json::{json, Value};

use super::errmsg;
use crate::clients::OutboundError;
use crate::discovery::DispatchError;
use crate::storage::StorageError;

/// Errors surfaced to gateway callers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Missing Content-Type header")]
    MissingContentType,

    #[error("Unsupported Content-Type: {0}")]
    UnknownContentType(String),

    #[error("Malformed {verb} request: {detail}")]
    MalformedRequest { verb: String, detail: &'static str },

    #[error("No worker available for function {0}")]
    NoWorkerAvailable(String),

    #[error("Worker {address} unreachable: {source}")]
    WorkerUnreachable {
        address: String,
        #[source]
        source: OutboundError,
    },

    #[error("Malformed {verb} reply from {address}: {detail}")]
    MalformedWorkerResponse {
        verb: &'static str,
        address: String,
        detail: &'static str,
    },

    #[error("Unknown process {0}")]
    UnknownProcess(String),

    #[error("{verb} to worker {address} failed: {source}")]
    WorkerRequestFailed {
        verb: &'static str,
        address: String,
        #[source]
        source: OutboundError,
    },

    #[error("Coordination store error: {0}")]
    Storage(#[from] StorageError),
}

impl GatewayError {
    pub fn malformed(verb: impl Into<String>, detail: &'static str) -> Self {
        GatewayError::MalformedRequest {
            verb: verb.into(),
            detail,
        }
    }

    /// Map a failed PUT/GET forward. Unreadable replies are malformed; any
    /// other failure, timeouts included, is a plain request failure.
    pub fn forward_failed(verb: &'static str, address: &str, source: OutboundError) -> Self {
        match source {
            OutboundError::Decode { .. } => GatewayError::MalformedWorkerResponse {
                verb,
                address: address.to_string(),
                detail: errmsg::REPLY_NOT_JSON,
            },
            source => GatewayError::WorkerRequestFailed {
                verb,
                address: address.to_string(),
                source,
            },
        }
    }

    /// Message returned to the caller.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::MissingContentType => errmsg::NO_CONTENT_TYPE.to_string(),
            GatewayError::UnknownContentType(_) => errmsg::UNKNOWN_CONTENT_TYPE.to_string(),
            GatewayError::MalformedRequest { verb, detail } => {
                format!("invalid {} request: {}", verb, detail)
            }
            GatewayError::NoWorkerAvailable(_) => errmsg::NO_WORKER.to_string(),
            GatewayError::WorkerUnreachable { .. } => errmsg::WORKER_UNREACHABLE.to_string(),
            GatewayError::MalformedWorkerResponse { verb, detail, .. } => {
                format!("invalid {} service response: {}", verb, detail)
            }
            GatewayError::UnknownProcess(_) => errmsg::UNKNOWN_PROCESS.to_string(),
            GatewayError::WorkerRequestFailed { verb, .. } => format!(
                "invalid {} service response: no response to {} from service",
                verb, verb
            ),
            GatewayError::Storage(_) => errmsg::STORE_UNAVAILABLE.to_string(),
        }
    }

    /// The `{"error": ...}` body.
    pub fn to_body(&self) -> Value {
        json!({ "error": self.public_message() })
    }
}

impl From<DispatchError> for GatewayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoWorkerAvailable(function) => GatewayError::NoWorkerAvailable(function),
            DispatchError::WorkerUnreachable { address, source } => {
                GatewayError::WorkerUnreachable { address, source }
            }
            DispatchError::WorkerFailed { address, source } => {
                GatewayError::forward_failed("POST", &address, source)
            }
            DispatchError::MissingProcessId { address } => GatewayError::MalformedWorkerResponse {
                verb: "POST",
                address,
                detail: errmsg::REPLY_WITHOUT_ID,
            },
            DispatchError::Storage(e) => GatewayError::Storage(e),
        }
    }
}
