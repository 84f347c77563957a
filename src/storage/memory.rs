//! In-memory coordination store.
//!
//! Mirrors the Redis primitives closely enough that the gateway behaves the
//! same against either backend. State is private to the process, so this
//! store is only suitable for tests and single-gateway deployments.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{parse_integer, CoordinationStore, Result, StorageError};

/// A stored value. Strings and lists share one key space, like Redis.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

/// Coordination store backed by a process-local map.
#[derive(Default)]
pub struct MemoryCoordinationStore {
    entries: RwLock<HashMap<String, Value>>,
    fail_all: RwLock<bool>,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `Unavailable`.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn check_available(&self) -> Result<()> {
        if *self.fail_all.read().await {
            return Err(StorageError::Unavailable(
                "memory store failure injected".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve Redis-style inclusive indices against a list length.
fn resolve_range(len: usize, start: isize, end: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };
    if start > end || start >= len || end < 0 {
        return None;
    }
    Some((start as usize, end as usize))
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_available().await?;
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available().await?;
        match self.entries.read().await.get(key) {
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::List(_)) => Err(StorageError::Unavailable(format!(
                "WRONGTYPE key {} holds a list",
                key
            ))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available().await?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.check_available().await?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.check_available().await?;
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(Value::Str(s)) => parse_integer(key, s)?,
            Some(Value::List(_)) => {
                return Err(StorageError::NotAnInteger {
                    key: key.to_string(),
                    value: "<list>".to_string(),
                })
            }
            None => 0,
        };
        let updated = current + delta;
        entries.insert(key.to_string(), Value::Str(updated.to_string()));
        Ok(updated)
    }

    async fn lpush(&self, list_key: &str, value: &str) -> Result<()> {
        self.check_available().await?;
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(list_key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        match entry {
            Value::List(list) => {
                list.push_front(value.to_string());
                Ok(())
            }
            Value::Str(_) => Err(StorageError::Unavailable(format!(
                "WRONGTYPE key {} holds a string",
                list_key
            ))),
        }
    }

    async fn llen(&self, list_key: &str) -> Result<usize> {
        self.check_available().await?;
        match self.entries.read().await.get(list_key) {
            Some(Value::List(list)) => Ok(list.len()),
            _ => Ok(0),
        }
    }

    async fn lrange(&self, list_key: &str, start: isize, end: isize) -> Result<Vec<String>> {
        self.check_available().await?;
        let entries = self.entries.read().await;
        let Some(Value::List(list)) = entries.get(list_key) else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, end) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn lrem(&self, list_key: &str, count: isize, value: &str) -> Result<usize> {
        self.check_available().await?;
        let mut entries = self.entries.write().await;
        let Some(Value::List(list)) = entries.get_mut(list_key) else {
            return Ok(0);
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs()
        };
        let mut removed = 0;

        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        // Redis drops empty lists
        if list.is_empty() {
            entries.remove(list_key);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryCoordinationStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.del("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
        // deleting again is fine
        store.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_incr_by_starts_from_zero_and_goes_negative() {
        let store = MemoryCoordinationStore::new();
        assert_eq!(store.incr_by("c", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("c", -1).await.unwrap(), 0);
        assert_eq!(store.incr_by("c", -1).await.unwrap(), -1);
        assert_eq!(store.get("c").await.unwrap(), Some("-1".to_string()));
    }

    #[tokio::test]
    async fn test_incr_by_rejects_non_integer() {
        let store = MemoryCoordinationStore::new();
        store.set("c", "abc").await.unwrap();
        let result = store.incr_by("c", 1).await;
        assert!(matches!(result, Err(StorageError::NotAnInteger { .. })));
    }

    #[tokio::test]
    async fn test_lpush_orders_newest_first() {
        let store = MemoryCoordinationStore::new();
        store.lpush("f", "a").await.unwrap();
        store.lpush("f", "b").await.unwrap();
        store.lpush("f", "c").await.unwrap();

        assert_eq!(store.llen("f").await.unwrap(), 3);
        assert_eq!(store.lrange("f", 0, -1).await.unwrap(), vec!["c", "b", "a"]);
        assert_eq!(store.lrange("f", 1, 1).await.unwrap(), vec!["b"]);
        assert_eq!(store.lrange("f", 0, 10).await.unwrap(), vec!["c", "b", "a"]);
        assert!(store.lrange("f", 5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lrange_missing_list_is_empty() {
        let store = MemoryCoordinationStore::new();
        assert_eq!(store.llen("nothing").await.unwrap(), 0);
        assert!(store.lrange("nothing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lrem_removes_requested_occurrences() {
        let store = MemoryCoordinationStore::new();
        for v in ["a", "b", "a", "a"] {
            store.lpush("f", v).await.unwrap();
        }
        // list is [a, a, b, a]
        assert_eq!(store.lrem("f", 1, "a").await.unwrap(), 1);
        assert_eq!(store.lrange("f", 0, -1).await.unwrap(), vec!["a", "b", "a"]);

        assert_eq!(store.lrem("f", -1, "a").await.unwrap(), 1);
        assert_eq!(store.lrange("f", 0, -1).await.unwrap(), vec!["a", "b"]);

        assert_eq!(store.lrem("f", 0, "zzz").await.unwrap(), 0);
        assert_eq!(store.lrem("f", 0, "a").await.unwrap(), 1);
        assert_eq!(store.lrem("f", 0, "b").await.unwrap(), 1);
        assert!(!store.exists("f").await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_all_injects_errors() {
        let store = MemoryCoordinationStore::new();
        store.set_fail_all(true).await;
        assert!(matches!(
            store.get("k").await,
            Err(StorageError::Unavailable(_))
        ));
        store.set_fail_all(false).await;
        assert!(store.get("k").await.is_ok());
    }
}
