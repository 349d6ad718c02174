//! Session-scoped cache of raw asset JSON, keyed by a hash of the identifier.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{PixxioError, Result};

/// A string key/value store provided by the host. Implementations must be
/// safe to share between threads.
pub trait StringCache: Send + Sync {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, String>;
    fn set(&self, key: &str, value: &str) -> std::result::Result<(), String>;
    fn flush(&self) -> std::result::Result<(), String>;
}

/// In-process [`StringCache`].
#[derive(Debug, Default)]
pub struct MemoryStringCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStringCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StringCache for MemoryStringCache {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, String> {
        let entries = self.entries.lock().map_err(|e| e.to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), String> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&self) -> std::result::Result<(), String> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.clear();
        Ok(())
    }
}

/// Stable cache key for an asset identifier.
pub fn cache_key(identifier: &str) -> String {
    hex::encode(Sha256::digest(identifier.as_bytes()))
}

/// Raw asset JSON cache on top of a host-provided [`StringCache`].
///
/// Reads and writes never fail the caller: a broken store is logged and
/// treated as a miss, so the remote API stays the source of truth.
pub struct ProxyCache<S: StringCache> {
    store: S,
}

impl<S: StringCache> ProxyCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get(&self, identifier: &str) -> Option<Value> {
        let key = cache_key(identifier);
        match self.store.get(&key) {
            Ok(Some(entry)) => match serde_json::from_str(&entry) {
                Ok(value) => {
                    debug!("Cache HIT for {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache MISS for {}", key);
                None
            }
            Err(e) => {
                warn!("Asset proxy cache unavailable, reading {} from pixx.io: {}", identifier, e);
                None
            }
        }
    }

    pub fn set(&self, identifier: &str, raw: &Value) {
        let key = cache_key(identifier);
        let encoded = match serde_json::to_string(raw) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Could not encode asset {} for caching: {}", identifier, e);
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &encoded) {
            warn!("Could not cache asset {}: {}", identifier, e);
        }
    }

    /// Drops every entry, forcing fresh data for a following bulk operation.
    pub fn flush(&self) -> Result<()> {
        self.store.flush().map_err(PixxioError::Cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenStore;

    impl StringCache for BrokenStore {
        fn get(&self, _key: &str) -> std::result::Result<Option<String>, String> {
            Err("backend down".to_string())
        }
        fn set(&self, _key: &str, _value: &str) -> std::result::Result<(), String> {
            Err("backend down".to_string())
        }
        fn flush(&self) -> std::result::Result<(), String> {
            Err("backend down".to_string())
        }
    }

    #[test]
    fn test_cache_key_is_stable_hash_of_identifier() {
        assert_eq!(cache_key("42"), cache_key("42"));
        assert_ne!(cache_key("42"), cache_key("43"));
        assert_eq!(cache_key("42").len(), 64);
    }

    #[test]
    fn test_set_overwrites_and_flush_clears() {
        let cache = ProxyCache::new(MemoryStringCache::new());
        assert_eq!(cache.get("1"), None);

        cache.set("1", &json!({ "id": "1", "subject": "old" }));
        cache.set("1", &json!({ "id": "1", "subject": "new" }));
        assert_eq!(cache.get("1").unwrap()["subject"], "new");
        assert_eq!(cache.store().len(), 1);

        cache.flush().unwrap();
        assert_eq!(cache.get("1"), None);
    }

    #[test]
    fn test_broken_store_degrades_to_miss() {
        let cache = ProxyCache::new(BrokenStore);
        cache.set("1", &json!({ "id": "1" }));
        assert_eq!(cache.get("1"), None);
        assert!(matches!(cache.flush(), Err(PixxioError::Cache(_))));
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let store = MemoryStringCache::new();
        store.set("a", "1").unwrap();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.entries.lock().unwrap();
            panic!("poison");
        }));
        assert!(store.entries.is_poisoned());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let store = MemoryStringCache::new();
        store.set(&cache_key("1"), "{not json").unwrap();
        let cache = ProxyCache::new(store);
        assert_eq!(cache.get("1"), None);
    }
}
