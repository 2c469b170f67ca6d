//! Cache configuration.
//!
//! Controls the listing cache store and its per-layer lifetimes via `folio.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_GROUP: &str = "folio";
const DEFAULT_CAPACITY: usize = 50_000;
const DEFAULT_META_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CATEGORIES_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_ROOT_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_INVALIDATION_FALLBACK_PAGES: u32 = 100;
const DEFAULT_INVALIDATION_MARGIN_PAGES: u32 = 2;

/// Cache configuration from `folio.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every read recomputes and nothing is stored.
    pub enabled: bool,
    /// Namespace all keys are stored under.
    pub group: String,
    /// Maximum entries held by the in-memory store.
    pub capacity: usize,
    /// Lifetime of `meta:{slug}` entries, in seconds.
    pub meta_ttl_seconds: u64,
    /// Lifetime of category index entries, in seconds.
    pub categories_ttl_seconds: u64,
    /// Lifetime of the root fragment, in seconds.
    pub root_ttl_seconds: u64,
    /// Pages swept on invalidation when no meta entry is cached.
    pub invalidation_fallback_pages: u32,
    /// Extra pages swept past the last known page count.
    pub invalidation_margin_pages: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group: DEFAULT_GROUP.to_string(),
            capacity: DEFAULT_CAPACITY,
            meta_ttl_seconds: DEFAULT_META_TTL_SECS,
            categories_ttl_seconds: DEFAULT_CATEGORIES_TTL_SECS,
            root_ttl_seconds: DEFAULT_ROOT_TTL_SECS,
            invalidation_fallback_pages: DEFAULT_INVALIDATION_FALLBACK_PAGES,
            invalidation_margin_pages: DEFAULT_INVALIDATION_MARGIN_PAGES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            group: settings.group.clone(),
            capacity: settings.capacity.get(),
            meta_ttl_seconds: settings.meta_ttl.as_secs(),
            categories_ttl_seconds: settings.categories_ttl.as_secs(),
            root_ttl_seconds: settings.root_ttl.as_secs(),
            invalidation_fallback_pages: settings.invalidation_fallback_pages,
            invalidation_margin_pages: settings.invalidation_margin_pages,
        }
    }
}

impl CacheConfig {
    /// Returns the store capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn meta_ttl(&self) -> Duration {
        Duration::from_secs(self.meta_ttl_seconds)
    }

    pub fn categories_ttl(&self) -> Duration {
        Duration::from_secs(self.categories_ttl_seconds)
    }

    pub fn root_ttl(&self) -> Duration {
        Duration::from_secs(self.root_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.group, "folio");
        assert_eq!(config.meta_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.categories_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.root_ttl(), Duration::from_secs(2_592_000));
        assert_eq!(config.invalidation_fallback_pages, 100);
        assert_eq!(config.invalidation_margin_pages, 2);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
