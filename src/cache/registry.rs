//! Written-key registry.
//!
//! Records every key the listing layers write, grouped by the category the
//! key is scoped to. Invalidation drains a category's set so pages written
//! past the last known page count are still purged.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Tracks category → written cache keys. Global summaries live under `None`.
///
/// Entries are only dropped by explicit deletes. Keys the store evicts or
/// expires stay registered, so [`KeyRegistry::key_count`] is an upper bound
/// on what is stored; purging a registered key that is already gone is a
/// no-op.
pub struct KeyRegistry {
    buckets: RwLock<HashMap<Option<String>, HashSet<CacheKey>>>,
}

impl KeyRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Record that `key` now holds a value.
    pub fn track(&self, key: &CacheKey) {
        let bucket = key.category().map(str::to_string);
        rw_write(&self.buckets, SOURCE, "track")
            .entry(bucket)
            .or_default()
            .insert(key.clone());
    }

    /// Forget a single key.
    pub fn untrack(&self, key: &CacheKey) {
        let bucket = key.category().map(str::to_string);
        let mut buckets = rw_write(&self.buckets, SOURCE, "untrack");
        if let Some(keys) = buckets.get_mut(&bucket) {
            keys.remove(key);
            if keys.is_empty() {
                buckets.remove(&bucket);
            }
        }
    }

    /// Remove and return every key tracked for `category`.
    pub fn take_category(&self, category: &str) -> HashSet<CacheKey> {
        rw_write(&self.buckets, SOURCE, "take_category")
            .remove(&Some(category.to_string()))
            .unwrap_or_default()
    }

    /// Remove and return every tracked global key (category indexes, root fragment).
    pub fn take_global(&self) -> HashSet<CacheKey> {
        rw_write(&self.buckets, SOURCE, "take_global")
            .remove(&None)
            .unwrap_or_default()
    }

    /// Keys currently tracked for `category`.
    pub fn keys_for_category(&self, category: &str) -> HashSet<CacheKey> {
        rw_read(&self.buckets, SOURCE, "keys_for_category")
            .get(&Some(category.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Clear all mappings.
    pub fn clear(&self) {
        rw_write(&self.buckets, SOURCE, "clear").clear();
    }

    /// Get the number of tracked keys across all buckets.
    pub fn key_count(&self) -> usize {
        rw_read(&self.buckets, SOURCE, "key_count")
            .values()
            .map(HashSet::len)
            .sum()
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
