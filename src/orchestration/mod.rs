//! Multi-step conversation coordination.
//!
//! - `correlation`: process id → owning worker across POST, PUT and GET
//! - `broadcast`: fan-out of broadcast requests and reply aggregation

pub mod broadcast;
pub mod correlation;

pub use broadcast::{BroadcastCoordinator, BroadcastTarget, Originator, BROADCAST_DELIMITER};
pub use correlation::{extract_process_id, CorrelationTable};
