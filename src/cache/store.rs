//! Cache storage.
//!
//! The backend is a generic string-keyed store namespaced by group. It has
//! no opinion on value shape; the typed layer on top serializes values.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT: &str = "folio_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode cache value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode cache value for `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Shared key/value store used by every listing layer.
///
/// `ttl = None` keeps the entry until it is deleted or the group is flushed.
pub trait CacheBackend: Send + Sync {
    fn get(&self, group: &str, key: &str) -> Result<Option<String>, CacheError>;

    fn set(
        &self,
        group: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Returns true when an entry was removed.
    fn delete(&self, group: &str, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry stored under `group`, returning how many were removed.
    fn flush_group(&self, group: &str) -> Result<usize, CacheError>;
}

struct StoredEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

type EntryKey = (String, String);

/// In-process backend with LRU eviction and per-entry expiry.
///
/// Eviction only ever turns an entry into a miss, which every reader
/// already handles by recomputing.
pub struct MemoryStore {
    entries: RwLock<LruCache<EntryKey, StoredEntry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Get the number of stored entries, including ones that expired but were not read since.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryStore {
    fn get(&self, group: &str, key: &str) -> Result<Option<String>, CacheError> {
        let entry_key = (group.to_string(), key.to_string());
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        match entries.get(&entry_key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }

        entries.pop(&entry_key);
        Ok(None)
    }

    fn set(
        &self,
        group: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let entry_key = (group.to_string(), key.to_string());
        let entry = StoredEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        let displaced = rw_write(&self.entries, SOURCE, "set").push(entry_key.clone(), entry);
        if let Some((displaced_key, _)) = displaced
            && displaced_key != entry_key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        Ok(())
    }

    fn delete(&self, group: &str, key: &str) -> Result<bool, CacheError> {
        let entry_key = (group.to_string(), key.to_string());
        Ok(rw_write(&self.entries, SOURCE, "delete")
            .pop(&entry_key)
            .is_some())
    }

    fn flush_group(&self, group: &str) -> Result<usize, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "flush_group");
        let doomed: Vec<EntryKey> = entries
            .iter()
            .filter(|((entry_group, _), _)| entry_group == group)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn store_with_capacity(capacity: usize) -> MemoryStore {
        MemoryStore::new(&CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let store = store_with_capacity(8);

        assert_eq!(store.get("g", "k").unwrap(), None);
        store.set("g", "k", "v".to_string(), None).unwrap();
        assert_eq!(store.get("g", "k").unwrap().as_deref(), Some("v"));

        assert!(store.delete("g", "k").unwrap());
        assert!(!store.delete("g", "k").unwrap());
        assert_eq!(store.get("g", "k").unwrap(), None);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let store = store_with_capacity(8);
        store
            .set("g", "k", "v".to_string(), Some(Duration::ZERO))
            .unwrap();
        assert_eq!(store.get("g", "k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn long_ttl_is_served() {
        let store = store_with_capacity(8);
        store
            .set("g", "k", "v".to_string(), Some(Duration::from_secs(3600)))
            .unwrap();
        assert_eq!(store.get("g", "k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn lru_eviction() {
        let store = store_with_capacity(2);
        store.set("g", "a", "1".to_string(), None).unwrap();
        store.set("g", "b", "2".to_string(), None).unwrap();

        // Touch `a` so `b` becomes least recently used.
        assert!(store.get("g", "a").unwrap().is_some());
        store.set("g", "c", "3".to_string(), None).unwrap();

        assert!(store.get("g", "a").unwrap().is_some());
        assert!(store.get("g", "b").unwrap().is_none());
        assert!(store.get("g", "c").unwrap().is_some());
    }

    #[test]
    fn flush_group_leaves_other_groups() {
        let store = store_with_capacity(8);
        store.set("folio", "a", "1".to_string(), None).unwrap();
        store.set("folio", "b", "2".to_string(), None).unwrap();
        store.set("other", "a", "3".to_string(), None).unwrap();

        assert_eq!(store.flush_group("folio").unwrap(), 2);
        assert!(store.get("folio", "a").unwrap().is_none());
        assert_eq!(store.get("other", "a").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store_with_capacity(8);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set("g", "k", "v".to_string(), None).unwrap();
        assert!(store.get("g", "k").unwrap().is_some());
    }
}
