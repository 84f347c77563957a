//! Two-tier cache of finalized process results.
//!
//! Entries are written once per process id and never evicted. The local tier
//! is a private map of this gateway; the shared tier lives in the
//! coordination store under `cached:<processId>`.
//!
//! Tier selection alternates through a promotion counter: a new entry goes
//! to the local tier while the local tier holds fewer entries than have been
//! promoted to the shared tier, otherwise it is promoted and the counter
//! advances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::storage::keys::cache_key;
use crate::storage::{CoordinationStore, Result};

/// Member a finalized worker reply must carry to be cached.
pub const RESPONSE_FIELD: &str = "response";

/// Member marking a payload as served from the cache.
pub const CACHED_FIELD: &str = "cached";

/// Tier an entry was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Shared,
}

/// Result cache keyed by process id.
pub struct ResultCache {
    store: Arc<dyn CoordinationStore>,
    local: RwLock<HashMap<String, Value>>,
    promoted: AtomicUsize,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            local: RwLock::new(HashMap::new()),
            promoted: AtomicUsize::new(0),
        }
    }

    /// Whether a finalized worker reply carries a result worth caching.
    pub fn is_cacheable(reply: &Value) -> bool {
        reply.get(RESPONSE_FIELD).is_some()
    }

    /// Find a cached result, local tier first.
    ///
    /// A shared-tier entry that is not valid JSON counts as a miss.
    pub async fn lookup(&self, process_id: &str) -> Result<Option<Value>> {
        if let Some(hit) = self.local.read().await.get(process_id) {
            debug!(process_id = %process_id, "Cache hit (local)");
            return Ok(Some(hit.clone()));
        }

        let Some(raw) = self.store.get(&cache_key(process_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(process_id = %process_id, "Cache hit (shared)");
                Ok(Some(value))
            }
            Err(e) => {
                warn!(process_id = %process_id, error = %e, "Unreadable shared cache entry");
                Ok(None)
            }
        }
    }

    /// Cache the finalized reply of a process, tagged as cached.
    pub async fn store(&self, process_id: &str, reply: &Value) -> Result<CacheTier> {
        let payload = cached_payload(reply);

        let mut local = self.local.write().await;
        if local.len() < self.promoted.load(Ordering::SeqCst) {
            local.insert(process_id.to_string(), payload);
            debug!(process_id = %process_id, local = local.len(), "Cached result (local)");
            return Ok(CacheTier::Local);
        }

        // local lock stays held until the promotion counter advances
        self.store
            .set(&cache_key(process_id), &payload.to_string())
            .await?;
        let promoted = self.promoted.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(process_id = %process_id, promoted = promoted, "Cached result (shared)");
        Ok(CacheTier::Shared)
    }

    /// Number of entries in the local tier.
    pub async fn local_len(&self) -> usize {
        self.local.read().await.len()
    }
}

/// The reply with `"cached": true` added. Non-object replies are wrapped
/// under `response`.
pub fn cached_payload(reply: &Value) -> Value {
    let mut object = match reply {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert(RESPONSE_FIELD.to_string(), other.clone());
            map
        }
    };
    object.insert(CACHED_FIELD.to_string(), Value::Bool(true));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCoordinationStore;
    use serde_json::json;

    fn make_cache() -> (Arc<MemoryCoordinationStore>, ResultCache) {
        let store = Arc::new(MemoryCoordinationStore::new());
        let cache = ResultCache::new(store.clone());
        (store, cache)
    }

    #[test]
    fn test_cached_payload_marks_object() {
        let payload = cached_payload(&json!({"id": 0, "response": 12}));
        assert_eq!(payload, json!({"cached": true, "id": 0, "response": 12}));
    }

    #[test]
    fn test_cached_payload_wraps_scalar() {
        assert_eq!(
            cached_payload(&json!(12)),
            json!({"cached": true, "response": 12})
        );
    }

    #[test]
    fn test_is_cacheable() {
        assert!(ResultCache::is_cacheable(&json!({"response": 12})));
        assert!(!ResultCache::is_cacheable(&json!({"error": "not ready"})));
    }

    #[tokio::test]
    async fn test_tiers_alternate_starting_with_shared() {
        let (store, cache) = make_cache();

        let mut tiers = Vec::new();
        for id in 0..5 {
            let tier = cache
                .store(&id.to_string(), &json!({"response": id}))
                .await
                .unwrap();
            tiers.push(tier);
        }

        assert_eq!(
            tiers,
            vec![
                CacheTier::Shared,
                CacheTier::Local,
                CacheTier::Shared,
                CacheTier::Local,
                CacheTier::Shared,
            ]
        );
        assert_eq!(cache.local_len().await, 2);
        assert!(store.exists("cached:0").await.unwrap());
        assert!(!store.exists("cached:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_hits_both_tiers() {
        let (_store, cache) = make_cache();
        cache.store("0", &json!({"response": 1})).await.unwrap();
        cache.store("1", &json!({"response": 2})).await.unwrap();

        assert_eq!(
            cache.lookup("0").await.unwrap(),
            Some(json!({"cached": true, "response": 1}))
        );
        assert_eq!(
            cache.lookup("1").await.unwrap(),
            Some(json!({"cached": true, "response": 2}))
        );
        // reads do not evict
        assert!(cache.lookup("1").await.unwrap().is_some());
        assert_eq!(cache.lookup("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_tier_visible_to_other_instances() {
        let (store, cache) = make_cache();
        cache.store("9", &json!({"response": 12})).await.unwrap();

        let other = ResultCache::new(store);
        assert_eq!(
            other.lookup("9").await.unwrap(),
            Some(json!({"cached": true, "response": 12}))
        );
    }

    #[tokio::test]
    async fn test_unreadable_shared_entry_is_miss() {
        let (store, cache) = make_cache();
        store.set("cached:3", "{not json").await.unwrap();

        assert_eq!(cache.lookup("3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, cache) = make_cache();
        store.set_fail_all(true).await;

        assert!(cache.store("0", &json!({"response": 1})).await.is_err());
        assert_eq!(cache.local_len().await, 0);
    }
}
