//! Identity resolver.
//!
//! Turns a category into its complete newest-first identifier list and keeps
//! it at `all_ids:{slug}` until the category is invalidated.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::application::hooks::{HookError, Hooks};
use crate::application::providers::{ClaimedCategory, ProviderChain};
use crate::application::repos::RepoError;
use crate::cache::{CacheKey, CacheLayer, Lookup};
use crate::domain::entities::{ItemId, sort_newest_first};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hook(#[from] HookError),
}

pub struct IdentityResolver {
    cache: Arc<CacheLayer>,
    providers: ProviderChain,
    hooks: Arc<Hooks>,
    content_types: Vec<String>,
}

impl IdentityResolver {
    /// `content_types` is the configured base set; hooks may extend it.
    pub fn new(
        cache: Arc<CacheLayer>,
        providers: ProviderChain,
        hooks: Arc<Hooks>,
        content_types: Vec<String>,
    ) -> Self {
        let content_types = hooks.content_types(content_types);
        Self {
            cache,
            providers,
            hooks,
            content_types,
        }
    }

    pub fn content_types(&self) -> &[String] {
        &self.content_types
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Ordered identifiers of `slug`. Never fails: resolution errors yield an
    /// empty list, which is not cached.
    pub async fn resolve(&self, slug: &str) -> Vec<ItemId> {
        if let Lookup::Hit(ids) = self.cache.get::<Vec<ItemId>>(&CacheKey::all_ids(slug)) {
            return ids;
        }

        let claimed = match self.providers.claim(slug).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(category = slug, error = %err, "category lookup failed");
                return Vec::new();
            }
        };

        match self.load(&claimed).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(category = slug, error = %err, "identifier resolution failed");
                Vec::new()
            }
        }
    }

    /// Cached list for an already claimed category, computing it on a miss.
    pub async fn load(&self, claimed: &ClaimedCategory) -> Result<Vec<ItemId>, ResolveError> {
        let key = CacheKey::all_ids(&claimed.category.slug);
        if let Lookup::Hit(ids) = self.cache.get::<Vec<ItemId>>(&key) {
            return Ok(ids);
        }
        self.recompute(claimed).await
    }

    /// Query the content store, ignoring any cached list, and store the result.
    pub async fn recompute(&self, claimed: &ClaimedCategory) -> Result<Vec<ItemId>, ResolveError> {
        let category = &claimed.category;
        let mut stamps = claimed
            .provider
            .stamps(category, &self.content_types)
            .await?;
        sort_newest_first(&mut stamps);

        let ids: Vec<ItemId> = stamps.into_iter().map(|stamp| stamp.id).collect();
        let ids = self.hooks.apply_ids_overrides(category, ids).await?;

        debug!(
            category = %category.slug,
            provider = claimed.provider.kind(),
            total = ids.len(),
            "resolved category identifiers"
        );
        self.cache.set(&CacheKey::all_ids(&category.slug), &ids);
        Ok(ids)
    }
}
