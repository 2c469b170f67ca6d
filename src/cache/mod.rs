//! Listing cache.
//!
//! A generic string-keyed store namespaced under one group, with a typed
//! facade on top. Each derived listing layer has its own key scheme and
//! lifetime:
//!
//! | key                   | lifetime            |
//! |-----------------------|---------------------|
//! | `all_ids:{slug}`      | until purged        |
//! | `ids:{slug}:{page}`   | until purged        |
//! | `posts:{slug}:{page}` | until purged        |
//! | `html:{slug}:{page}`  | until purged        |
//! | `meta:{slug}`         | `meta_ttl_seconds`  |
//! | `categories[:{ctx}]`  | `categories_ttl_seconds` |
//! | `root_html`           | `root_ttl_seconds`  |
//!
//! ```toml
//! [cache]
//! enabled = true
//! group = "folio"
//! capacity = 50000
//! ```

mod config;
mod keys;
mod layer;
mod lock;
mod registry;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, Layer};
pub use layer::{CacheLayer, Lookup};
pub(crate) use lock::{rw_read, rw_write};
pub use registry::KeyRegistry;
pub use store::{CacheBackend, CacheError, MemoryStore};
