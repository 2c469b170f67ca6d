//! Row materializer.
//!
//! Bulk-fetches the display rows of one page without asking the store for
//! an order, then restores the page's identifier order locally.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::hooks::{HookError, Hooks};
use crate::application::repos::{ContentRepo, RepoError};
use crate::cache::{CacheKey, CacheLayer, Lookup};
use crate::domain::entities::{Category, ItemId, ItemRow};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hook(#[from] HookError),
}

pub struct RowMaterializer {
    cache: Arc<CacheLayer>,
    repo: Arc<dyn ContentRepo>,
    hooks: Arc<Hooks>,
}

impl RowMaterializer {
    pub fn new(cache: Arc<CacheLayer>, repo: Arc<dyn ContentRepo>, hooks: Arc<Hooks>) -> Self {
        Self { cache, repo, hooks }
    }

    /// Rows of `page`, served from `posts:{slug}:{page}` when present.
    pub async fn load(
        &self,
        category: &Category,
        page: u32,
        page_ids: &[ItemId],
    ) -> Result<Vec<ItemRow>, MaterializeError> {
        let key = CacheKey::posts(&category.slug, page);
        if let Lookup::Hit(rows) = self.cache.get::<Vec<ItemRow>>(&key) {
            return Ok(rows);
        }
        self.rebuild(category, page, page_ids).await
    }

    /// Materialize and store, ignoring any cached rows.
    pub async fn rebuild(
        &self,
        category: &Category,
        page: u32,
        page_ids: &[ItemId],
    ) -> Result<Vec<ItemRow>, MaterializeError> {
        let rows = self.materialize(category, page, page_ids).await?;
        self.cache.set(&CacheKey::posts(&category.slug, page), &rows);
        Ok(rows)
    }

    /// Prefetch hooks, bulk fetch, transform hooks, normalization, reorder.
    pub async fn materialize(
        &self,
        category: &Category,
        page: u32,
        page_ids: &[ItemId],
    ) -> Result<Vec<ItemRow>, MaterializeError> {
        let raw = match self.hooks.prefetch_rows(category, page, page_ids).await? {
            Some(rows) => rows,
            None if page_ids.is_empty() => Vec::new(),
            None => self.repo.fetch_rows(page_ids).await?,
        };

        let transformed = self.hooks.transform_rows(category, page, raw);
        let rows: Vec<ItemRow> = transformed
            .into_iter()
            .filter_map(|row| row.normalize())
            .collect();

        debug!(
            category = %category.slug,
            page,
            requested = page_ids.len(),
            materialized = rows.len(),
            "materialized page rows"
        );
        Ok(reorder(rows, page_ids))
    }
}

/// Order `rows` to match `order`. Rows whose id is not in `order` keep
/// their relative order and go last.
pub fn reorder(mut rows: Vec<ItemRow>, order: &[ItemId]) -> Vec<ItemRow> {
    let positions: HashMap<ItemId, usize> = order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();
    rows.sort_by_key(|row| positions.get(&row.id).copied().unwrap_or(usize::MAX));
    rows
}
