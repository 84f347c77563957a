//! Redis storage implementations.

mod coordination_store;

pub use coordination_store::RedisCoordinationStore;
