//! Coordination store implementations.
//!
//! The coordination store is the single source of truth shared by every
//! gateway instance: the function registry lists, per-worker load counters,
//! the process correlation table and the shared result-cache tier all live
//! here. Only single-key atomic primitives are assumed; nothing is composed
//! into multi-key transactions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};

pub mod keys;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryCoordinationStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisCoordinationStore;

/// Result type for coordination store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur talking to the coordination store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Value at key {key} is not an integer: {value}")]
    NotAnInteger { key: String, value: String },

    #[error("Storage backend not available: {0}")]
    Unavailable(String),
}

/// Key-value store with atomic single-key primitives.
///
/// List semantics follow Redis: `lpush` inserts at the head, `lrange` takes
/// inclusive indices where negative values count from the tail, and `lrem`
/// removes `count` occurrences from the head (count > 0), from the tail
/// (count < 0) or all of them (count == 0).
///
/// Implementations:
/// - `RedisCoordinationStore`: shared Redis instance (production)
/// - `MemoryCoordinationStore`: process-local maps (tests, single-node runs)
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Check whether a key holds any value.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<()>;

    /// Atomically add `delta` to an integer value, returning the new value.
    ///
    /// An absent key counts as `0`.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Push a value onto the head of a list.
    async fn lpush(&self, list_key: &str, value: &str) -> Result<()>;

    /// Length of a list (0 when absent).
    async fn llen(&self, list_key: &str) -> Result<usize>;

    /// Inclusive range of list elements.
    async fn lrange(&self, list_key: &str, start: isize, end: isize) -> Result<Vec<String>>;

    /// Remove occurrences of `value`, returning how many were removed.
    async fn lrem(&self, list_key: &str, count: isize, value: &str) -> Result<usize>;
}

/// Initialize the coordination store based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Arc<dyn CoordinationStore>, Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Coordination store: in-memory (single gateway only)");
            Ok(Arc::new(MemoryCoordinationStore::new()))
        }
        #[cfg(feature = "redis")]
        StorageType::Redis => {
            let store = RedisCoordinationStore::connect_with_backoff(
                &config.redis.uri,
                config.redis.key_prefix.as_deref(),
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StorageType::Redis => {
            error!("Redis storage requested but 'redis' feature is not enabled");
            Err("Redis feature not enabled".into())
        }
    }
}

/// Parse a stored integer, tolerating surrounding whitespace.
pub(crate) fn parse_integer(key: &str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| {
        error!(key = %key, value = %value, "Non-integer value in coordination store");
        StorageError::NotAnInteger {
            key: key.to_string(),
            value: value.to_string(),
        }
    })
}
