//! Error message constants for gateway responses.
//!
//! These are the messages callers see in `{"error": ...}` bodies. Worker
//! addresses and underlying causes are logged, never returned.

/// Request carried no Content-Type header.
pub const NO_CONTENT_TYPE: &str = "Content-Type error: no content-type specification";

/// Request Content-Type is not JSON.
pub const UNKNOWN_CONTENT_TYPE: &str = "Content-Type error: content-type is unknown";

/// No worker registered for the requested function.
pub const NO_WORKER: &str = "invalid POST request: not found service with such function name";

/// Selected worker could not be reached during dispatch.
pub const WORKER_UNREACHABLE: &str =
    "invalid POST service response: no response to POST from service";

/// Process id not present in the correlation table.
pub const UNKNOWN_PROCESS: &str = "no process with such ID";

/// Coordination store failure (sanitized).
pub const STORE_UNAVAILABLE: &str = "coordination store unavailable";

/// Request details for `invalid <VERB> request: <detail>`.
pub const BODY_NOT_JSON: &str = "body is not valid JSON";
pub const BODY_NOT_OBJECT: &str = "body is not a JSON object";
pub const NO_FUNCTION_NAME: &str = "function name not found in request";
pub const NO_ADDRESS: &str = "service address not found in request";
pub const NO_PROCESS_ID: &str = "not specified ID of process";
pub const UNSUPPORTED_METHOD: &str = "method is not supported";

/// Worker reply details for `invalid <VERB> service response: <detail>`.
pub const REPLY_WITHOUT_ID: &str = "response does not have ID";
pub const REPLY_NOT_JSON: &str = "response is not valid JSON";
