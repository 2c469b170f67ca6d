//! Repository traits describing the content-store adapter.
//!
//! The listing engine never owns content; it only queries it through
//! [`ContentRepo`].

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{ItemId, ItemStamp, RawRow, TermRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Published items of the given content types attached to the term `term_slug`.
    async fn term_item_stamps(
        &self,
        term_slug: &str,
        content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError>;

    /// Published items of a single content type.
    async fn type_item_stamps(&self, content_type: &str) -> Result<Vec<ItemStamp>, RepoError>;

    /// Bulk row fetch. Result order is unspecified.
    async fn fetch_rows(&self, ids: &[ItemId]) -> Result<Vec<RawRow>, RepoError>;

    /// Every taxonomy term, ordered by name.
    async fn list_terms(&self) -> Result<Vec<TermRecord>, RepoError>;

    async fn find_term(&self, slug: &str) -> Result<Option<TermRecord>, RepoError>;

    /// Terms attached to an item, with their depth in the term tree.
    async fn terms_for_item(&self, item_id: ItemId) -> Result<Vec<TermRecord>, RepoError>;
}
