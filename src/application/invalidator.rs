//! Category invalidation.
//!
//! Purges every derived layer of a category plus the global summaries. The
//! page sweep covers the last known page count plus a margin, and then every
//! page key the registry saw written, so pages past a stale bound go too.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::{CacheKey, CacheLayer};
use crate::domain::entities::CategoryMeta;

/// What a single invalidation removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub category: String,
    /// Last known page count, when meta was cached.
    pub known_pages: Option<u32>,
    /// Pages swept by number.
    pub swept_pages: u32,
    /// Entries actually removed from the store.
    pub removed: usize,
}

pub struct Invalidator {
    cache: Arc<CacheLayer>,
}

impl Invalidator {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self { cache }
    }

    pub fn invalidate(&self, slug: &str) -> InvalidationReport {
        let config = self.cache.config();
        let known_pages = self
            .cache
            .get::<CategoryMeta>(&CacheKey::meta(slug))
            .into_option()
            .map(|meta| meta.total_pages);
        let swept_pages = match known_pages {
            Some(pages) => pages.saturating_add(config.invalidation_margin_pages),
            None => config.invalidation_fallback_pages,
        };

        let mut removed = 0;
        let mut purge = |key: &CacheKey| {
            if self.cache.delete(key) {
                removed += 1;
            }
        };

        purge(&CacheKey::all_ids(slug));
        purge(&CacheKey::meta(slug));

        for page in 1..=swept_pages {
            for key in CacheKey::page_keys(slug, page) {
                purge(&key);
            }
        }

        // Anything written beyond the swept bound.
        for key in self.cache.registry().take_category(slug) {
            purge(&key);
        }

        purge(&CacheKey::categories(None));
        purge(&CacheKey::RootHtml);
        for key in self.cache.registry().take_global() {
            purge(&key);
        }

        info!(
            category = slug,
            known_pages,
            swept_pages,
            removed,
            "invalidated category cache"
        );
        InvalidationReport {
            category: slug.to_string(),
            known_pages,
            swept_pages,
            removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::cache::{CacheConfig, MemoryStore};
    use crate::domain::entities::ItemId;

    fn cache() -> Arc<CacheLayer> {
        let config = CacheConfig::default();
        Arc::new(CacheLayer::new(
            config.clone(),
            Arc::new(MemoryStore::new(&config)),
        ))
    }

    fn meta(total_pages: u32) -> CategoryMeta {
        CategoryMeta {
            total_items: u64::from(total_pages) * 500,
            total_pages,
            last_build: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn sweeps_known_pages_plus_margin() {
        let cache = cache();
        cache.set(&CacheKey::meta("news"), &meta(3));
        cache.set(&CacheKey::all_ids("news"), &vec![1_i64]);
        for page in 1..=5 {
            cache.set(&CacheKey::html("news", page), &"x".to_string());
        }
        cache.set(&CacheKey::RootHtml, &"root".to_string());
        cache.set(&CacheKey::categories(Some("footer")), &Vec::<String>::new());

        let report = Invalidator::new(cache.clone()).invalidate("news");
        assert_eq!(report.known_pages, Some(3));
        assert_eq!(report.swept_pages, 5);
        assert_eq!(report.removed, 9);

        assert!(!cache.get::<String>(&CacheKey::html("news", 5)).is_hit());
        assert!(!cache.get::<String>(&CacheKey::RootHtml).is_hit());
        assert!(
            !cache
                .get::<Vec<String>>(&CacheKey::categories(Some("footer")))
                .is_hit()
        );
    }

    #[test]
    fn tracked_pages_beyond_the_bound_are_purged() {
        let cache = cache();
        cache.set(&CacheKey::meta("news"), &meta(1));
        // Written after a bulk import the cached meta never saw.
        cache.set(&CacheKey::ids("news", 40), &vec![7 as ItemId]);
        cache.set(&CacheKey::posts("news", 40), &Vec::<String>::new());

        Invalidator::new(cache.clone()).invalidate("news");
        assert!(!cache.get::<Vec<ItemId>>(&CacheKey::ids("news", 40)).is_hit());
        assert!(!cache.get::<Vec<String>>(&CacheKey::posts("news", 40)).is_hit());
    }

    #[test]
    fn missing_meta_uses_fallback_bound() {
        let cache = cache();
        let report = Invalidator::new(cache).invalidate("news");
        assert_eq!(report.known_pages, None);
        assert_eq!(report.swept_pages, 100);
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn other_categories_survive() {
        let cache = cache();
        cache.set(&CacheKey::html("sports", 1), &"s".to_string());
        Invalidator::new(cache.clone()).invalidate("news");
        assert!(cache.get::<String>(&CacheKey::html("sports", 1)).is_hit());
    }
}
