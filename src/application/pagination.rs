//! Fixed-size page arithmetic over an ordered identifier list.

use crate::domain::entities::ItemId;

/// Items per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Number of pages needed for `total_items`. Zero items means zero pages.
pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Identifiers on 1-indexed `page`. Out-of-range pages, page zero included, are empty.
pub fn slice(all_ids: &[ItemId], page: u32, page_size: u32) -> Vec<ItemId> {
    if page == 0 || page_size == 0 {
        return Vec::new();
    }
    let size = page_size as usize;
    let Some(offset) = (page as usize - 1).checked_mul(size) else {
        return Vec::new();
    };
    all_ids.iter().skip(offset).take(size).copied().collect()
}

/// Parse a page number from a URL segment or query value.
///
/// Returns `None` for anything that is not a positive integer.
pub fn parse_page(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(page) => Some(page),
    }
}

/// URL suffix of a listing page relative to the category link.
pub fn url_suffix(page: u32) -> String {
    if page <= 1 {
        String::new()
    } else {
        format!("page/{page}")
    }
}
