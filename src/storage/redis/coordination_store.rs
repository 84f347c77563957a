//! Redis CoordinationStore implementation.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::storage::{CoordinationStore, Result, StorageError};
use crate::utils::retry::connection_backoff;

/// Redis coordination store.
///
/// Every primitive maps onto exactly one Redis command, so each operation is
/// atomic on its key. When a key prefix is configured it is prepended as
/// `{prefix}:{key}`; the logical key layout is otherwise untouched.
pub struct RedisCoordinationStore {
    conn: ConnectionManager,
    key_prefix: Option<String>,
}

impl RedisCoordinationStore {
    /// Create a new Redis coordination store.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `key_prefix` - Optional namespace for all keys
    pub async fn new(url: &str, key_prefix: Option<&str>) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis coordination store");

        Ok(Self {
            conn,
            key_prefix: key_prefix.map(str::to_string),
        })
    }

    /// Connect with exponential backoff, for gateways starting before Redis.
    pub async fn connect_with_backoff(url: &str, key_prefix: Option<&str>) -> Result<Self> {
        (|| Self::new(url, key_prefix))
            .retry(connection_backoff())
            .notify(|err: &StorageError, dur: Duration| {
                warn!(url = %url, error = %err, delay = ?dur, "Redis connection failed, retrying");
            })
            .await
    }

    fn key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.key(key)).await?;
        Ok(exists)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.key(key), value).await?;
        debug!(key = %key, "Stored value in Redis");
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(key)).await?;
        debug!(key = %key, "Deleted key from Redis");
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(self.key(key), delta).await?;
        Ok(value)
    }

    async fn lpush(&self, list_key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(self.key(list_key), value).await?;
        Ok(())
    }

    async fn llen(&self, list_key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(self.key(list_key)).await?;
        Ok(len)
    }

    async fn lrange(&self, list_key: &str, start: isize, end: isize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.lrange(self.key(list_key), start, end).await?;
        Ok(values)
    }

    async fn lrem(&self, list_key: &str, count: isize, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.lrem(self.key(list_key), count, value).await?;
        Ok(removed)
    }
}
