//! Inbound request classification.
//!
//! Turns the raw verb, headers, query and body of a gateway request into a
//! typed [`GatewayRequest`], rejecting anything malformed at the boundary.

use axum::http::{header, HeaderMap, Method};
use serde_json::{Map, Value};

use super::errmsg;
use super::error::GatewayError;
use crate::orchestration::{extract_process_id, BroadcastTarget, Originator};

/// Header carrying registration and broadcast annotations.
pub const SERVICE_CALL_HEADER: &str = "Service-Call";
/// Header a worker uses to announce the port it listens on.
pub const SERVICE_PORT_HEADER: &str = "ServicePort";
/// Header a worker uses to announce its registered address.
pub const SERVICE_ORIGIN_HEADER: &str = "Service-Origin";

const REGISTRATION: &str = "true";
const JSON_MEDIA_TYPE: &str = "application/json";

/// A validated gateway request.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    /// A worker announcing itself for a function.
    Register {
        function_name: String,
        address: String,
    },
    /// Fan-out to the workers of one or all functions.
    Broadcast {
        target: BroadcastTarget,
        payload: Value,
        originator: Originator,
    },
    /// Start a new process on the least-loaded worker.
    Dispatch {
        function_name: String,
        payload: Value,
    },
    /// PUT refining an in-flight process.
    Update { process_id: String, payload: Value },
    /// GET finalizing a process.
    Finalize { process_id: String },
}

impl GatewayRequest {
    /// Classify an inbound request.
    ///
    /// `peer_port` is the TCP port of the caller, used as the broadcast
    /// originator when no `ServicePort` header is present.
    pub fn parse(
        method: &Method,
        headers: &HeaderMap,
        query: Option<&str>,
        body: &[u8],
        peer_port: Option<u16>,
    ) -> Result<Self, GatewayError> {
        match *method {
            Method::GET => Self::parse_get(query),
            Method::POST => {
                let payload = json_body("POST", headers, body)?;
                Self::parse_post(headers, payload, peer_port)
            }
            Method::PUT => {
                let payload = json_body("PUT", headers, body)?;
                let process_id = extract_process_id(&Value::Object(payload.clone()))
                    .ok_or_else(|| GatewayError::malformed("PUT", errmsg::NO_PROCESS_ID))?;
                Ok(GatewayRequest::Update {
                    process_id,
                    payload: Value::Object(payload),
                })
            }
            ref other => Err(GatewayError::malformed(
                other.as_str(),
                errmsg::UNSUPPORTED_METHOD,
            )),
        }
    }

    fn parse_get(query: Option<&str>) -> Result<Self, GatewayError> {
        query
            .and_then(|q| query_param(q, "id"))
            .filter(|id| !id.is_empty())
            .map(|process_id| GatewayRequest::Finalize { process_id })
            .ok_or_else(|| GatewayError::malformed("GET", errmsg::NO_PROCESS_ID))
    }

    fn parse_post(
        headers: &HeaderMap,
        payload: Map<String, Value>,
        peer_port: Option<u16>,
    ) -> Result<Self, GatewayError> {
        let service_call = header_str(headers, SERVICE_CALL_HEADER);

        if service_call == Some(REGISTRATION) {
            let function_name = required_str(&payload, "functionName", errmsg::NO_FUNCTION_NAME)?;
            let address = required_str(&payload, "address", errmsg::NO_ADDRESS)?;
            return Ok(GatewayRequest::Register {
                function_name,
                address,
            });
        }

        if let Some(target) = service_call.and_then(BroadcastTarget::from_header) {
            let port = header_str(headers, SERVICE_PORT_HEADER)
                .and_then(|p| p.parse().ok())
                .or(peer_port);
            let address = header_str(headers, SERVICE_ORIGIN_HEADER).map(str::to_string);
            return Ok(GatewayRequest::Broadcast {
                target,
                payload: Value::Object(payload),
                originator: Originator { port, address },
            });
        }

        // any other Service-Call value is an ordinary dispatch
        let function_name = required_str(&payload, "functionName", errmsg::NO_FUNCTION_NAME)?;
        Ok(GatewayRequest::Dispatch {
            function_name,
            payload: Value::Object(payload),
        })
    }
}

/// Validate the Content-Type and decode a JSON object body.
pub(crate) fn json_body(
    verb: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Map<String, Value>, GatewayError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .ok_or(GatewayError::MissingContentType)?;
    let content_type = content_type.to_str().unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        return Err(GatewayError::UnknownContentType(content_type.to_string()));
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::malformed(verb, errmsg::BODY_NOT_OBJECT)),
        Err(_) => Err(GatewayError::malformed(verb, errmsg::BODY_NOT_JSON)),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn required_str(
    payload: &Map<String, Value>,
    field: &str,
    detail: &'static str,
) -> Result<String, GatewayError> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(GatewayError::malformed("POST", detail)),
    }
}

/// First value of a query parameter. Values are taken verbatim.
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.trim().to_string())
    })
}
