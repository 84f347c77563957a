//! HTTP handlers.
//!
//! - `gateway`: the gateway's request handling and router
//! - `convert`: example worker used for demos and end-to-end tests

pub mod convert;
pub mod gateway;
