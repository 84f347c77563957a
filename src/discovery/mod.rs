//! Worker discovery and load balancing.
//!
//! Workers announce themselves to the gateway; there is no external
//! discovery source:
//! - `registry`: function name → worker addresses, plus per-worker load counters
//! - `balancer`: least-loaded selection and dispatch of new processes

pub mod balancer;
pub mod registry;

pub use balancer::{DispatchError, Dispatched, LoadBalancer};
pub use registry::ServiceRegistry;
