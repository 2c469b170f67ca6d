#![allow(dead_code)]

use std::sync::Arc;

use folio::application::engine::{EngineOptions, ListingEngine};
use folio::application::hooks::Hooks;
use folio::application::listing::ListingOptions;
use folio::application::providers::VirtualCategory;
use folio::domain::types::ContentStatus;
use folio::infra::memory::{MemoryContentRepo, StoredItem};
use time::{Duration, OffsetDateTime, macros::datetime};

pub const NEWS: i64 = 1;
pub const SPORTS: i64 = 2;
pub const EMPTY: i64 = 3;

pub const BASE: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

/// Published post `id`, created `id` minutes after [`BASE`], so larger ids are newer.
pub fn post(id: i64) -> StoredItem {
    StoredItem::new(
        id,
        "post",
        ContentStatus::Published,
        BASE + Duration::minutes(id),
    )
}

/// Terms `news`, `sports` and `empty`, with `news_items` posts in `news`
/// (ids `1..=news_items`) and two posts in `sports`.
pub fn seeded_repo(news_items: i64) -> Arc<MemoryContentRepo> {
    let repo = Arc::new(MemoryContentRepo::new());
    repo.add_term(NEWS, "news", "News", None);
    repo.add_term(SPORTS, "sports", "Sports", None);
    repo.add_term(EMPTY, "empty", "Empty", None);

    for id in 1..=news_items {
        repo.insert_item(post(id), &[NEWS]);
    }
    repo.insert_item(post(100_001), &[SPORTS]);
    repo.insert_item(post(100_002), &[SPORTS]);
    repo
}

pub fn engine(repo: Arc<MemoryContentRepo>, page_size: u32) -> ListingEngine {
    engine_with_hooks(repo, page_size, Hooks::new())
}

pub fn engine_with_hooks(
    repo: Arc<MemoryContentRepo>,
    page_size: u32,
    hooks: Hooks,
) -> ListingEngine {
    let options = EngineOptions {
        listing: ListingOptions {
            page_size,
            ..Default::default()
        },
        ..Default::default()
    };
    ListingEngine::build(repo, hooks, options)
}

/// Engine with one virtual category, `videos`, listing every `video` item.
pub fn engine_with_videos(repo: Arc<MemoryContentRepo>, page_size: u32) -> ListingEngine {
    let options = EngineOptions {
        listing: ListingOptions {
            page_size,
            ..Default::default()
        },
        virtual_categories: vec![VirtualCategory {
            slug: "videos".to_string(),
            name: "Videos".to_string(),
            content_type: "video".to_string(),
        }],
        ..Default::default()
    };
    ListingEngine::build(repo, Hooks::new(), options)
}

/// Published video `id`, created like [`post`].
pub fn video(id: i64) -> StoredItem {
    StoredItem::new(
        id,
        "video",
        ContentStatus::Published,
        BASE + Duration::minutes(id),
    )
}

/// A point in time past the default debounce window.
pub fn after_debounce() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::seconds(61)
}

/// Position of `needle` in `haystack`, panicking with context when absent.
pub fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not found in fragment"))
}
