//! Typed cache facade.
//!
//! Wraps a [`CacheBackend`] with JSON encoding, per-layer lifetimes, and a
//! [`Lookup`] sentinel so an empty cached list is never mistaken for a miss.
//! Backend failures degrade to a miss on read and are dropped on write.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheKey, Layer};
use super::registry::KeyRegistry;
use super::store::{CacheBackend, CacheError};

const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
const METRIC_CACHE_WRITE_FAILED: &str = "folio_cache_write_failed_total";

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
}

impl<T> Lookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }
}

/// Listing cache shared by the resolver, materializer, renderer and invalidator.
pub struct CacheLayer {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    registry: KeyRegistry,
}

impl CacheLayer {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            registry: KeyRegistry::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Read and decode `key`. Anything other than a decodable stored value is a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Lookup<T> {
        let layer = key.layer();
        if !self.config.enabled {
            record_miss(layer);
            return Lookup::Miss;
        }

        let rendered = key.to_string();
        let raw = match self.backend.get(&self.config.group, &rendered) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                record_miss(layer);
                return Lookup::Miss;
            }
            Err(err) => {
                warn!(key = %rendered, error = %err, "cache read failed, treating as miss");
                record_miss(layer);
                return Lookup::Miss;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %rendered, layer = layer.as_str(), outcome = "hit");
                counter!(METRIC_CACHE_HIT, "layer" => layer.as_str()).increment(1);
                Lookup::Hit(value)
            }
            Err(source) => {
                let err = CacheError::Decode {
                    key: rendered.clone(),
                    source,
                };
                warn!(error = %err, "discarding undecodable cache entry");
                self.delete(key);
                record_miss(layer);
                Lookup::Miss
            }
        }
    }

    /// Best-effort write using the layer's lifetime. Failures are logged and counted.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        if !self.config.enabled {
            return;
        }

        let rendered = key.to_string();
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(source) => {
                let err = CacheError::Encode {
                    key: rendered,
                    source,
                };
                warn!(error = %err, "skipping cache write");
                counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
                return;
            }
        };

        let ttl = self.ttl_for(key.layer());
        match self
            .backend
            .set(&self.config.group, &rendered, encoded, ttl)
        {
            Ok(()) => {
                self.registry.track(key);
                debug!(key = %rendered, ttl_secs = ttl.map(|t| t.as_secs()), "cache write");
            }
            Err(err) => {
                warn!(key = %rendered, error = %err, "cache write failed");
                counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
            }
        }
    }

    /// Delete `key`. Returns true when an entry was removed.
    pub fn delete(&self, key: &CacheKey) -> bool {
        self.registry.untrack(key);
        let rendered = key.to_string();
        match self.backend.delete(&self.config.group, &rendered) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(key = %rendered, error = %err, "cache delete failed");
                false
            }
        }
    }

    /// Drop every entry under the configured group.
    pub fn flush(&self) -> Result<usize, CacheError> {
        self.registry.clear();
        self.backend.flush_group(&self.config.group)
    }

    fn ttl_for(&self, layer: Layer) -> Option<Duration> {
        match layer {
            Layer::Meta => Some(self.config.meta_ttl()),
            Layer::Categories => Some(self.config.categories_ttl()),
            Layer::RootHtml => Some(self.config.root_ttl()),
            Layer::AllIds | Layer::Ids | Layer::Posts | Layer::Html => None,
        }
    }
}

fn record_miss(layer: Layer) {
    counter!(METRIC_CACHE_MISS, "layer" => layer.as_str()).increment(1);
}
