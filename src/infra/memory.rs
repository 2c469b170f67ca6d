//! In-process content store.
//!
//! Implements [`ContentRepo`] over plain collections. Used by the test
//! suites and for running the listing engine without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{ContentRepo, RepoError};
use crate::cache::{rw_read, rw_write};
use crate::domain::entities::{ItemId, ItemStamp, RawRow, TermRecord};
use crate::domain::types::ContentStatus;

const SOURCE: &str = "infra::memory";

/// A content item as stored by [`MemoryContentRepo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub id: ItemId,
    pub title: String,
    pub slug: String,
    pub content_type: String,
    pub status: ContentStatus,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

impl StoredItem {
    pub fn new(
        id: ItemId,
        content_type: &str,
        status: ContentStatus,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            title: format!("Item {id}"),
            slug: format!("item-{id}"),
            content_type: content_type.to_string(),
            status,
            created_at,
            modified_at: created_at,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

#[derive(Debug, Clone)]
struct StoredTerm {
    slug: String,
    name: String,
    parent_id: Option<i64>,
}

#[derive(Default)]
struct Content {
    items: BTreeMap<ItemId, StoredItem>,
    terms: BTreeMap<i64, StoredTerm>,
    links: HashMap<ItemId, Vec<i64>>,
}

impl Content {
    fn depth_of(&self, term_id: i64) -> i32 {
        let mut depth = 0;
        let mut current = self.terms.get(&term_id).and_then(|term| term.parent_id);
        while let Some(parent) = current {
            depth += 1;
            // Guard against parent cycles.
            if depth as usize > self.terms.len() {
                break;
            }
            current = self.terms.get(&parent).and_then(|term| term.parent_id);
        }
        depth
    }

    fn record(&self, term_id: i64) -> Option<TermRecord> {
        let term = self.terms.get(&term_id)?;
        Some(TermRecord {
            id: term_id,
            slug: term.slug.clone(),
            name: term.name.clone(),
            parent_id: term.parent_id,
            depth: self.depth_of(term_id),
        })
    }

    fn term_id_by_slug(&self, slug: &str) -> Option<i64> {
        self.terms
            .iter()
            .find(|(_, term)| term.slug == slug)
            .map(|(id, _)| *id)
    }
}

fn stamp(item: &StoredItem) -> ItemStamp {
    ItemStamp {
        id: item.id,
        created_at: item.created_at,
    }
}

#[derive(Default)]
pub struct MemoryContentRepo {
    content: RwLock<Content>,
    failing: AtomicBool,
    fetch_calls: AtomicUsize,
    stamp_calls: AtomicUsize,
}

impl MemoryContentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&self, id: i64, slug: &str, name: &str, parent_id: Option<i64>) {
        rw_write(&self.content, SOURCE, "add_term").terms.insert(
            id,
            StoredTerm {
                slug: slug.to_string(),
                name: name.to_string(),
                parent_id,
            },
        );
    }

    /// Insert or replace an item and its term links.
    pub fn insert_item(&self, item: StoredItem, term_ids: &[i64]) {
        let mut content = rw_write(&self.content, SOURCE, "insert_item");
        content.links.insert(item.id, term_ids.to_vec());
        content.items.insert(item.id, item);
    }

    /// Returns the previous status, if the item exists.
    pub fn set_status(&self, id: ItemId, status: ContentStatus) -> Option<ContentStatus> {
        let mut content = rw_write(&self.content, SOURCE, "set_status");
        let item = content.items.get_mut(&id)?;
        Some(std::mem::replace(&mut item.status, status))
    }

    /// Make every query fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of bulk row fetches served.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of identifier queries served.
    pub fn stamp_calls(&self) -> usize {
        self.stamp_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepoError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentRepo for MemoryContentRepo {
    async fn term_item_stamps(
        &self,
        term_slug: &str,
        content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError> {
        self.check()?;
        self.stamp_calls.fetch_add(1, Ordering::SeqCst);
        let content = rw_read(&self.content, SOURCE, "term_item_stamps");
        let Some(term_id) = content.term_id_by_slug(term_slug) else {
            return Ok(Vec::new());
        };

        Ok(content
            .items
            .values()
            .filter(|item| item.status.is_published())
            .filter(|item| content_types.contains(&item.content_type))
            .filter(|item| {
                content
                    .links
                    .get(&item.id)
                    .is_some_and(|terms| terms.contains(&term_id))
            })
            .map(stamp)
            .collect())
    }

    async fn type_item_stamps(&self, content_type: &str) -> Result<Vec<ItemStamp>, RepoError> {
        self.check()?;
        self.stamp_calls.fetch_add(1, Ordering::SeqCst);
        let content = rw_read(&self.content, SOURCE, "type_item_stamps");
        Ok(content
            .items
            .values()
            .filter(|item| item.status.is_published() && item.content_type == content_type)
            .map(stamp)
            .collect())
    }

    async fn fetch_rows(&self, ids: &[ItemId]) -> Result<Vec<RawRow>, RepoError> {
        self.check()?;
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let content = rw_read(&self.content, SOURCE, "fetch_rows");
        // Ascending id order, unrelated to the requested order.
        Ok(content
            .items
            .values()
            .filter(|item| ids.contains(&item.id))
            .map(|item| RawRow {
                id: Some(item.id),
                title: Some(item.title.clone()),
                slug: Some(item.slug.clone()),
                created_at: Some(item.created_at),
                modified_at: Some(item.modified_at),
            })
            .collect())
    }

    async fn list_terms(&self) -> Result<Vec<TermRecord>, RepoError> {
        self.check()?;
        let content = rw_read(&self.content, SOURCE, "list_terms");
        let mut terms: Vec<TermRecord> = content
            .terms
            .keys()
            .filter_map(|id| content.record(*id))
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(terms)
    }

    async fn find_term(&self, slug: &str) -> Result<Option<TermRecord>, RepoError> {
        self.check()?;
        let content = rw_read(&self.content, SOURCE, "find_term");
        Ok(content
            .term_id_by_slug(slug)
            .and_then(|id| content.record(id)))
    }

    async fn terms_for_item(&self, item_id: ItemId) -> Result<Vec<TermRecord>, RepoError> {
        self.check()?;
        let content = rw_read(&self.content, SOURCE, "terms_for_item");
        Ok(content
            .links
            .get(&item_id)
            .map(|ids| ids.iter().filter_map(|id| content.record(*id)).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[tokio::test]
    async fn term_depth_follows_parents() {
        let repo = MemoryContentRepo::new();
        repo.add_term(1, "news", "News", None);
        repo.add_term(2, "local", "Local", Some(1));
        repo.add_term(3, "city", "City", Some(2));

        let term = repo.find_term("city").await.unwrap().unwrap();
        assert_eq!(term.depth, 2);
        assert_eq!(repo.find_term("news").await.unwrap().unwrap().depth, 0);
    }

    #[tokio::test]
    async fn stamps_only_include_published_items_of_listed_types() {
        let repo = MemoryContentRepo::new();
        repo.add_term(1, "news", "News", None);
        let at = datetime!(2024-05-01 12:00 UTC);
        repo.insert_item(StoredItem::new(1, "post", ContentStatus::Published, at), &[1]);
        repo.insert_item(StoredItem::new(2, "post", ContentStatus::Draft, at), &[1]);
        repo.insert_item(StoredItem::new(3, "page", ContentStatus::Published, at), &[1]);

        let stamps = repo
            .term_item_stamps("news", &["post".to_string()])
            .await
            .unwrap();
        assert_eq!(stamps.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);

        repo.set_failing(true);
        assert!(repo.fetch_rows(&[1]).await.is_err());
    }
}
