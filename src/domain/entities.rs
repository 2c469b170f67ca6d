//! Domain entities mirrored from the content store and the derived listing layers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::ContentStatus;

/// Identifier of a content item in the content store.
pub type ItemId = i64;

/// A content item as seen by the write-trigger path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ContentStatus>,
}

/// A taxonomy term. `depth` is zero for root terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<i64>,
    pub depth: i32,
}

/// Ordering key of an item inside a category listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStamp {
    pub id: ItemId,
    pub created_at: OffsetDateTime,
}

/// Sort stamps newest first; identical timestamps fall back to the larger id.
pub fn sort_newest_first(stamps: &mut [ItemStamp]) {
    stamps.sort_unstable_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// A named grouping of items. May be a taxonomy term or a virtual category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
}

/// A display row before normalization. Fields may be missing when a row
/// comes from an extension rather than the content store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub id: Option<ItemId>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
}

impl RawRow {
    /// Coerce every display field to a definite value. Rows without an id are dropped.
    pub fn normalize(self) -> Option<ItemRow> {
        let id = self.id?;
        let created_at = self.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Some(ItemRow {
            id,
            title: self.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            slug: self.slug.unwrap_or_default(),
            created_at,
            modified_at: self.modified_at.unwrap_or(created_at),
        })
    }
}

/// Normalized display row cached in the posts layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    pub title: String,
    pub slug: String,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

impl ItemRow {
    /// Label shown in listings; untitled items fall back to their slug.
    pub fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.slug
        } else {
            &self.title
        }
    }
}

/// Summary of a category derived from its ordered identifier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMeta {
    pub total_items: u64,
    pub total_pages: u32,
    pub last_build: OffsetDateTime,
}

impl CategoryMeta {
    pub fn empty() -> Self {
        Self {
            total_items: 0,
            total_pages: 0,
            last_build: OffsetDateTime::now_utc(),
        }
    }
}

/// One (category, page) row of the category index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub slug: String,
    pub name: String,
    pub item_count: u64,
    pub page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub url_suffix: String,
}

/// A breadcrumb link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub label: String,
    pub link: String,
}

impl Crumb {
    pub fn new(label: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            link: link.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn newest_first_breaks_ties_by_larger_id() {
        let ts = datetime!(2024-05-01 10:00 UTC);
        let mut stamps = vec![
            ItemStamp { id: 3, created_at: ts },
            ItemStamp {
                id: 1,
                created_at: datetime!(2024-06-01 10:00 UTC),
            },
            ItemStamp { id: 9, created_at: ts },
        ];

        sort_newest_first(&mut stamps);

        let ids: Vec<_> = stamps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 9, 3]);
    }

    #[test]
    fn normalize_drops_rows_without_id() {
        let row = RawRow {
            title: Some("orphan".to_string()),
            ..Default::default()
        };
        assert!(row.normalize().is_none());
    }

    #[test]
    fn normalize_fills_missing_fields() {
        let created = datetime!(2024-01-02 03:04 UTC);
        let row = RawRow {
            id: Some(7),
            title: None,
            slug: Some("seven".to_string()),
            created_at: Some(created),
            modified_at: None,
        }
        .normalize()
        .expect("row with id survives");

        assert_eq!(row.title, "");
        assert_eq!(row.label(), "seven");
        assert_eq!(row.modified_at, created);
    }
}
