//! Cache key definitions.
//!
//! Every derived listing layer has its own key scheme. Keys render to the
//! flat strings stored in the backend (`ids:news:2`, `root_html`, ...).

use std::fmt;

/// Logical cache layer a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Complete ordered identifier list of a category.
    AllIds,
    /// One page slice of identifiers.
    Ids,
    /// Category totals.
    Meta,
    /// Normalized display rows for a page.
    Posts,
    /// Rendered fragment for a page.
    Html,
    /// Category index used by the root listing.
    Categories,
    /// Rendered root index.
    RootHtml,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::AllIds => "all_ids",
            Layer::Ids => "ids",
            Layer::Meta => "meta",
            Layer::Posts => "posts",
            Layer::Html => "html",
            Layer::Categories => "categories",
            Layer::RootHtml => "root_html",
        }
    }
}

/// A key into the listing cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AllIds(String),
    Ids { slug: String, page: u32 },
    Meta(String),
    Posts { slug: String, page: u32 },
    Html { slug: String, page: u32 },
    /// `None` is the default navigation context.
    Categories(Option<String>),
    RootHtml,
}

impl CacheKey {
    pub fn all_ids(slug: &str) -> Self {
        Self::AllIds(slug.to_string())
    }

    pub fn ids(slug: &str, page: u32) -> Self {
        Self::Ids {
            slug: slug.to_string(),
            page,
        }
    }

    pub fn meta(slug: &str) -> Self {
        Self::Meta(slug.to_string())
    }

    pub fn posts(slug: &str, page: u32) -> Self {
        Self::Posts {
            slug: slug.to_string(),
            page,
        }
    }

    pub fn html(slug: &str, page: u32) -> Self {
        Self::Html {
            slug: slug.to_string(),
            page,
        }
    }

    pub fn categories(context: Option<&str>) -> Self {
        Self::Categories(context.map(str::to_string))
    }

    pub fn layer(&self) -> Layer {
        match self {
            CacheKey::AllIds(_) => Layer::AllIds,
            CacheKey::Ids { .. } => Layer::Ids,
            CacheKey::Meta(_) => Layer::Meta,
            CacheKey::Posts { .. } => Layer::Posts,
            CacheKey::Html { .. } => Layer::Html,
            CacheKey::Categories(_) => Layer::Categories,
            CacheKey::RootHtml => Layer::RootHtml,
        }
    }

    /// Category the key is scoped to; `None` for global summaries.
    pub fn category(&self) -> Option<&str> {
        match self {
            CacheKey::AllIds(slug) | CacheKey::Meta(slug) => Some(slug),
            CacheKey::Ids { slug, .. }
            | CacheKey::Posts { slug, .. }
            | CacheKey::Html { slug, .. } => Some(slug),
            CacheKey::Categories(_) | CacheKey::RootHtml => None,
        }
    }

    /// The three page-scoped keys of one category page.
    pub fn page_keys(slug: &str, page: u32) -> [CacheKey; 3] {
        [
            CacheKey::ids(slug, page),
            CacheKey::posts(slug, page),
            CacheKey::html(slug, page),
        ]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllIds(slug) => write!(f, "all_ids:{slug}"),
            CacheKey::Ids { slug, page } => write!(f, "ids:{slug}:{page}"),
            CacheKey::Meta(slug) => write!(f, "meta:{slug}"),
            CacheKey::Posts { slug, page } => write!(f, "posts:{slug}:{page}"),
            CacheKey::Html { slug, page } => write!(f, "html:{slug}:{page}"),
            CacheKey::Categories(None) => f.write_str("categories"),
            CacheKey::Categories(Some(context)) => write!(f, "categories:{context}"),
            CacheKey::RootHtml => f.write_str("root_html"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_layer_prefixed_strings() {
        assert_eq!(CacheKey::all_ids("news").to_string(), "all_ids:news");
        assert_eq!(CacheKey::ids("news", 2).to_string(), "ids:news:2");
        assert_eq!(CacheKey::meta("news").to_string(), "meta:news");
        assert_eq!(CacheKey::posts("news", 3).to_string(), "posts:news:3");
        assert_eq!(CacheKey::html("news", 1).to_string(), "html:news:1");
        assert_eq!(CacheKey::categories(None).to_string(), "categories");
        assert_eq!(
            CacheKey::categories(Some("footer")).to_string(),
            "categories:footer"
        );
        assert_eq!(CacheKey::RootHtml.to_string(), "root_html");
    }

    #[test]
    fn page_keys_share_category_scope() {
        for key in CacheKey::page_keys("news", 4) {
            assert_eq!(key.category(), Some("news"));
        }
        assert_eq!(CacheKey::RootHtml.category(), None);
        assert_eq!(CacheKey::categories(Some("x")).layer(), Layer::Categories);
    }
}
