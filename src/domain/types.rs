//! Shared domain enumerations aligned with the content store's status values.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a content item as reported by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Pending,
    Scheduled,
    Published,
    Private,
    Trash,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Pending => "pending",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
            ContentStatus::Private => "private",
            ContentStatus::Trash => "trash",
        }
    }

    pub fn is_published(self) -> bool {
        matches!(self, ContentStatus::Published)
    }
}

impl TryFrom<&str> for ContentStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(ContentStatus::Draft),
            "pending" => Ok(ContentStatus::Pending),
            "scheduled" | "future" => Ok(ContentStatus::Scheduled),
            "published" | "publish" => Ok(ContentStatus::Published),
            "private" => Ok(ContentStatus::Private),
            "trash" => Ok(ContentStatus::Trash),
            _ => Err(()),
        }
    }
}

/// Returns true when an item crosses the published boundary in either direction.
pub fn crosses_publish_boundary(new_status: ContentStatus, old_status: ContentStatus) -> bool {
    new_status.is_published() != old_status.is_published()
}
