//! Bellhop - API gateway for pools of self-registering workers
//!
//! Workers register themselves per function name. The gateway spreads new
//! processes across them by load, routes follow-up PUT and GET requests to
//! the worker owning each process, fans broadcasts out, and caches finalized
//! results. All shared state lives in a coordination store (Redis in
//! production) so several gateways can front the same pool.

pub mod cache;
pub mod clients;
pub mod config;
pub mod discovery;
pub mod handlers;
pub mod orchestration;
pub mod storage;
pub mod utils;
