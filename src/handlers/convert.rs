//! Example "convert" worker.
//!
//! A placeholder currency conversion unit that speaks the worker side of the
//! gateway protocol:
//! - POST creates a process and replies with its id
//! - PUT records an argument (`firstCurrency`, `secondCurrency`, `source`)
//!   or, with `finalize`, marks the process ready
//! - GET `?id=` returns the result of a ready process and forgets it
//! - broadcasts are acknowledged
//!
//! Used for demos and end-to-end tests; the computation is a constant.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use backon::Retryable;
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::clients::http::{BROADCAST_DELIVERY, SERVICE_CALL_HEADER};
use crate::handlers::gateway::{errmsg, json_body, GatewayError, SERVICE_PORT_HEADER};
use crate::utils::bootstrap::shutdown_signal;
use crate::utils::retry::registration_backoff;

/// Result every finalized conversion yields.
pub const CONVERSION_RESULT: i64 = 12;

/// Arguments a PUT may carry, in precedence order.
const ARGUMENT_FIELDS: [&str; 3] = ["firstCurrency", "secondCurrency", "source"];
const FINALIZE_FIELD: &str = "finalize";
const NOT_READY: &str = "process has not received all required arguments";

/// Lifecycle of a worker-side process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Created,
    Building,
    Processing,
}

/// A conversion in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: u64,
    pub process_name: String,
    pub status: ProcessStatus,
    #[serde(skip)]
    pub arguments: HashMap<String, String>,
}

/// State of one convert worker.
pub struct ConvertWorker {
    function_name: String,
    next_id: AtomicU64,
    processes: RwLock<HashMap<u64, Process>>,
}

impl ConvertWorker {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            next_id: AtomicU64::new(0),
            processes: RwLock::new(HashMap::new()),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Create a process from a dispatch payload.
    pub async fn create(&self, payload: &Map<String, Value>) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let process_name = payload
            .get("functionName")
            .and_then(Value::as_str)
            .unwrap_or(&self.function_name)
            .to_string();

        let mut arguments = HashMap::new();
        if let Some(amount) = payload.get("amount") {
            arguments.insert("amount".to_string(), text_of(amount));
        }

        let process = Process {
            id,
            process_name,
            status: ProcessStatus::Created,
            arguments,
        };
        let reply = process_json(&process);
        self.processes.write().await.insert(id, process);

        debug!(process_id = id, "Process created");
        reply
    }

    /// Apply a PUT to an existing process.
    pub async fn update(&self, payload: &Map<String, Value>) -> Value {
        let Some(id) = payload.get("id").and_then(parse_id) else {
            return error_body(errmsg::UNKNOWN_PROCESS);
        };

        let mut processes = self.processes.write().await;
        let Some(process) = processes.get_mut(&id) else {
            return error_body(errmsg::UNKNOWN_PROCESS);
        };

        process.status = ProcessStatus::Building;
        if let Some((field, value)) = ARGUMENT_FIELDS
            .iter()
            .find_map(|f| payload.get(*f).map(|v| (*f, v)))
        {
            process.arguments.insert(field.to_string(), text_of(value));
        } else if payload.contains_key(FINALIZE_FIELD) {
            process.status = ProcessStatus::Processing;
        }

        debug!(process_id = id, status = ?process.status, "Process updated");
        process_json(process)
    }

    /// Produce the result of a ready process and forget it.
    ///
    /// A process that is not ready yet is kept and answered with an error.
    pub async fn finalize(&self, id: u64) -> Value {
        let mut processes = self.processes.write().await;
        match processes.get(&id) {
            None => error_body(errmsg::UNKNOWN_PROCESS),
            Some(process) if process.status != ProcessStatus::Processing => {
                warn!(process_id = id, "Process not ready for finalization");
                json!({ "id": id, "error": NOT_READY })
            }
            Some(_) => {
                processes.remove(&id);
                info!(process_id = id, result = CONVERSION_RESULT, "Process finalized");
                json!({ "id": id, "response": CONVERSION_RESULT })
            }
        }
    }

    /// Acknowledge a broadcast.
    pub fn acknowledge(&self, payload: &Map<String, Value>) -> Value {
        debug!(keys = payload.len(), "Broadcast received");
        json!({ "function": self.function_name, "acknowledged": true })
    }

    /// Number of processes in flight.
    pub async fn in_flight(&self) -> usize {
        self.processes.read().await.len()
    }
}

fn process_json(process: &Process) -> Value {
    serde_json::to_value(process).unwrap_or_else(|_| json!({ "id": process.id }))
}

fn error_body(message: &str) -> Value {
    json!({ "error": message })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Build the worker router.
pub fn router(worker: Arc<ConvertWorker>) -> Router {
    Router::new()
        .route("/", any(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(worker)
}

/// Serve the worker on an already bound listener until Ctrl-C.
pub async fn serve(
    worker: Arc<ConvertWorker>,
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(address = %listener.local_addr()?, function = %worker.function_name(), "Worker listening");
    axum::serve(listener, router(worker))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn handle(
    State(worker): State<Arc<ConvertWorker>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let reply = if method == Method::GET {
        let id = query
            .as_deref()
            .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("id=")))
            .and_then(|id| id.trim().parse().ok());
        match id {
            Some(id) => worker.finalize(id).await,
            None => error_body(errmsg::UNKNOWN_PROCESS),
        }
    } else if method == Method::POST || method == Method::PUT {
        match json_body(method.as_str(), &headers, &body) {
            Ok(payload) if method == Method::PUT => worker.update(&payload).await,
            Ok(payload) if is_broadcast(&headers) => worker.acknowledge(&payload),
            Ok(payload) => worker.create(&payload).await,
            Err(e) => e.to_body(),
        }
    } else {
        GatewayError::malformed(method.as_str(), errmsg::UNSUPPORTED_METHOD).to_body()
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        reply.to_string(),
    )
        .into_response()
}

fn is_broadcast(headers: &HeaderMap) -> bool {
    headers
        .get(SERVICE_CALL_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == BROADCAST_DELIVERY)
}

/// Register a worker with a gateway, retrying until the gateway answers.
///
/// `address` is the worker's own reachable address; its port is announced
/// in the `ServicePort` header for broadcast self-exclusion.
pub async fn register_with_gateway(
    client: &reqwest::Client,
    gateway: &str,
    function_name: &str,
    address: &str,
) -> Result<Value, reqwest::Error> {
    let port = Url::parse(address)
        .ok()
        .and_then(|url| url.port_or_known_default());
    let body = json!({ "functionName": function_name, "address": address });
    let body = &body;

    let register = || async move {
        let mut request = client
            .post(gateway)
            .header(SERVICE_CALL_HEADER, "true")
            .json(body);
        if let Some(port) = port {
            request = request.header(SERVICE_PORT_HEADER, port.to_string());
        }
        request.send().await?.error_for_status()?.json::<Value>().await
    };

    let reply = register
        .retry(registration_backoff())
        .notify(|err: &reqwest::Error, dur: Duration| {
            warn!(gateway = %gateway, error = %err, delay = ?dur, "Registration failed, retrying");
        })
        .await?;

    info!(gateway = %gateway, function = %function_name, address = %address, "Registered with gateway");
    Ok(reply)
}

/// Worker address for a listener bound on `local`, as seen from `host`.
pub fn worker_address(host: &str, local: SocketAddr) -> String {
    format!("http://{}:{}/", host, local.port())
}
