//! Listing read API and page rebuild pipeline.
//!
//! Reads fall through the cache layers (html → posts → ids → all_ids),
//! computing and storing each missing layer on the way. Rebuilds run the
//! same pipeline with the page layers forced.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::hooks::Hooks;
use crate::application::materializer::{MaterializeError, RowMaterializer};
use crate::application::pagination::{self, DEFAULT_PAGE_SIZE};
use crate::application::providers::{ClaimedCategory, ProviderChain};
use crate::application::repos::RepoError;
use crate::application::resolver::{IdentityResolver, ResolveError};
use crate::cache::{CacheKey, CacheLayer, Lookup};
use crate::domain::entities::{Category, CategoryEntry, CategoryMeta, Crumb, ItemId, ItemRow};
use crate::presentation::{FragmentRenderer, LinkItem, Section, TemplateRenderError};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Page size and link layout of rendered listings.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub page_size: u32,
    /// Prepended to category slugs, e.g. `/category` gives `/category/news`.
    pub link_prefix: String,
    /// Prepended to item slugs.
    pub item_link_prefix: String,
    pub home_label: String,
    pub home_link: String,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            link_prefix: String::new(),
            item_link_prefix: "/posts".to_string(),
            home_label: "Home".to_string(),
            home_link: "/".to_string(),
        }
    }
}

impl ListingOptions {
    pub fn category_link(&self, slug: &str) -> String {
        format!("{}/{slug}", self.link_prefix.trim_end_matches('/'))
    }

    pub fn page_link(&self, slug: &str, page: u32) -> String {
        let suffix = pagination::url_suffix(page);
        if suffix.is_empty() {
            self.category_link(slug)
        } else {
            format!("{}/{suffix}", self.category_link(slug))
        }
    }

    pub fn item_link(&self, row: &ItemRow) -> String {
        format!("{}/{}", self.item_link_prefix.trim_end_matches('/'), row.slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Serve cached layers when present.
    Read,
    /// Recompute the page layers (ids, posts, html).
    Rebuild,
}

pub struct ListingService {
    cache: Arc<CacheLayer>,
    resolver: Arc<IdentityResolver>,
    materializer: Arc<RowMaterializer>,
    renderer: Arc<dyn FragmentRenderer>,
    hooks: Arc<Hooks>,
    options: ListingOptions,
}

impl ListingService {
    pub fn new(
        cache: Arc<CacheLayer>,
        resolver: Arc<IdentityResolver>,
        materializer: Arc<RowMaterializer>,
        renderer: Arc<dyn FragmentRenderer>,
        hooks: Arc<Hooks>,
        options: ListingOptions,
    ) -> Self {
        Self {
            cache,
            resolver,
            materializer,
            renderer,
            hooks,
            options,
        }
    }

    pub fn options(&self) -> &ListingOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    fn providers(&self) -> &ProviderChain {
        self.resolver.providers()
    }

    /// Markup for one category page. Unknown categories and out-of-range
    /// pages render the placeholder, which is never cached.
    pub async fn category_page_fragment(&self, slug: &str, page: u32) -> String {
        if let Lookup::Hit(html) = self.cache.get::<String>(&CacheKey::html(slug, page)) {
            return html;
        }

        match self.build_page(slug, page, Mode::Read).await {
            Ok(Some(html)) => html,
            Ok(None) => self.placeholder(),
            Err(err) => {
                warn!(category = slug, page, error = %err, "page build failed, serving placeholder");
                self.placeholder()
            }
        }
    }

    /// Markup for the root index of every non-empty category page.
    pub async fn root_fragment(&self) -> String {
        if let Lookup::Hit(html) = self.cache.get::<String>(&CacheKey::RootHtml) {
            return html;
        }

        let (entries, complete) = self.index(None).await;
        let sections = if entries.is_empty() {
            Vec::new()
        } else {
            vec![Section {
                label: "Categories".to_string(),
                css_classes: "category-index".to_string(),
                items: entries.iter().map(|entry| self.index_link(entry)).collect(),
            }]
        };

        match self.renderer.render(&sections) {
            Ok(html) => {
                if complete {
                    self.cache.set(&CacheKey::RootHtml, &html);
                }
                html
            }
            Err(err) => {
                warn!(error = %err, "root fragment render failed");
                String::new()
            }
        }
    }

    /// Totals of `slug`. Failures report zero items.
    pub async fn category_meta(&self, slug: &str) -> CategoryMeta {
        if let Lookup::Hit(meta) = self.cache.get::<CategoryMeta>(&CacheKey::meta(slug)) {
            return meta;
        }

        match self.providers().claim(slug).await {
            Ok(Some(claimed)) => match self.load_meta(&claimed).await {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(category = slug, error = %err, "meta computation failed");
                    CategoryMeta::empty()
                }
            },
            Ok(None) => CategoryMeta::empty(),
            Err(err) => {
                warn!(category = slug, error = %err, "category lookup failed");
                CategoryMeta::empty()
            }
        }
    }

    /// One entry per (category, page) of every category with items.
    pub async fn list_categories(&self, context: Option<&str>) -> Vec<CategoryEntry> {
        self.index(context).await.0
    }

    /// Home, category, then `Page N` past the first page, then hook entries.
    pub async fn breadcrumbs(&self, slug: &str, page: u32) -> Vec<Crumb> {
        let mut crumbs = vec![Crumb::new(
            self.options.home_label.clone(),
            self.options.home_link.clone(),
        )];

        let claimed = match self.providers().claim(slug).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return crumbs,
            Err(err) => {
                warn!(category = slug, error = %err, "category lookup failed");
                return crumbs;
            }
        };

        let category = &claimed.category;
        crumbs.push(Crumb::new(
            self.hooks.category_name(category),
            self.options.category_link(&category.slug),
        ));
        if page > 1 {
            crumbs.push(Crumb::new(
                format!("Page {page}"),
                self.options.page_link(&category.slug, page),
            ));
        }
        self.hooks.breadcrumbs(category, page, crumbs)
    }

    /// Identifiers on `page`; empty when out of range or on failure.
    pub async fn page_ids(&self, slug: &str, page: u32) -> Vec<ItemId> {
        if let Lookup::Hit(ids) = self.cache.get::<Vec<ItemId>>(&CacheKey::ids(slug, page)) {
            return ids;
        }
        let result = match self.claim(slug).await {
            Ok(Some(claimed)) => self.load_page_ids(&claimed, page, Mode::Read).await,
            Ok(None) => Ok(Vec::new()),
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            warn!(category = slug, page, error = %err, "page slice failed");
            Vec::new()
        })
    }

    /// Display rows on `page`; empty when out of range or on failure.
    pub async fn page_rows(&self, slug: &str, page: u32) -> Vec<ItemRow> {
        if let Lookup::Hit(rows) = self.cache.get::<Vec<ItemRow>>(&CacheKey::posts(slug, page)) {
            return rows;
        }
        let result = match self.claim(slug).await {
            Ok(Some(claimed)) => self.load_page_rows(&claimed, page, Mode::Read).await,
            Ok(None) => Ok(Vec::new()),
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            warn!(category = slug, page, error = %err, "page rows failed");
            Vec::new()
        })
    }

    /// Slugs of every known category, including empty ones.
    pub async fn category_slugs(&self) -> Result<Vec<String>, RepoError> {
        let categories = self.providers().list_categories().await?;
        Ok(categories
            .into_iter()
            .map(|claimed| claimed.category.slug)
            .collect())
    }

    /// Recompute the identifier list and totals of `slug`, ignoring the cache.
    pub async fn refresh_category(&self, slug: &str) -> Result<CategoryMeta, RebuildError> {
        let Some(claimed) = self.claim(slug).await? else {
            return Ok(CategoryMeta::empty());
        };
        self.resolver.recompute(&claimed).await?;
        self.store_meta(&claimed).await
    }

    /// Recompute totals from the current identifier list.
    pub async fn refresh_meta(&self, slug: &str) -> Result<CategoryMeta, RebuildError> {
        let Some(claimed) = self.claim(slug).await? else {
            return Ok(CategoryMeta::empty());
        };
        self.store_meta(&claimed).await
    }

    /// Slice, materialize, render and store one page. Returns false when the
    /// page does not exist.
    pub async fn rebuild_page(&self, slug: &str, page: u32) -> Result<bool, RebuildError> {
        Ok(self.build_page(slug, page, Mode::Rebuild).await?.is_some())
    }

    async fn claim(&self, slug: &str) -> Result<Option<ClaimedCategory>, RebuildError> {
        Ok(self.providers().claim(slug).await?)
    }

    async fn build_page(
        &self,
        slug: &str,
        page: u32,
        mode: Mode,
    ) -> Result<Option<String>, RebuildError> {
        let Some(claimed) = self.claim(slug).await? else {
            return Ok(None);
        };
        let meta = self.load_meta(&claimed).await?;
        if page == 0 || page > meta.total_pages {
            debug!(category = slug, page, total_pages = meta.total_pages, "page out of range");
            return Ok(None);
        }

        let rows = self.load_page_rows(&claimed, page, mode).await?;
        let html = self.render_rows(&claimed.category, &rows)?;
        self.cache.set(&CacheKey::html(slug, page), &html);
        Ok(Some(html))
    }

    async fn load_page_ids(
        &self,
        claimed: &ClaimedCategory,
        page: u32,
        mode: Mode,
    ) -> Result<Vec<ItemId>, RebuildError> {
        let key = CacheKey::ids(&claimed.category.slug, page);
        if mode == Mode::Read
            && let Lookup::Hit(ids) = self.cache.get::<Vec<ItemId>>(&key)
        {
            return Ok(ids);
        }

        let all_ids = self.resolver.load(claimed).await?;
        let ids = pagination::slice(&all_ids, page, self.options.page_size);
        if !ids.is_empty() {
            self.cache.set(&key, &ids);
        }
        Ok(ids)
    }

    async fn load_page_rows(
        &self,
        claimed: &ClaimedCategory,
        page: u32,
        mode: Mode,
    ) -> Result<Vec<ItemRow>, RebuildError> {
        let ids = self.load_page_ids(claimed, page, mode).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = match mode {
            Mode::Read => self.materializer.load(&claimed.category, page, &ids).await?,
            Mode::Rebuild => {
                self.materializer
                    .rebuild(&claimed.category, page, &ids)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn load_meta(&self, claimed: &ClaimedCategory) -> Result<CategoryMeta, ResolveError> {
        let key = CacheKey::meta(&claimed.category.slug);
        if let Lookup::Hit(meta) = self.cache.get::<CategoryMeta>(&key) {
            return Ok(meta);
        }
        let meta = self.compute_meta(claimed).await?;
        self.cache.set(&key, &meta);
        Ok(meta)
    }

    async fn store_meta(&self, claimed: &ClaimedCategory) -> Result<CategoryMeta, RebuildError> {
        let meta = self.compute_meta(claimed).await?;
        self.cache.set(&CacheKey::meta(&claimed.category.slug), &meta);
        Ok(meta)
    }

    async fn compute_meta(&self, claimed: &ClaimedCategory) -> Result<CategoryMeta, ResolveError> {
        let all_ids = self.resolver.load(claimed).await?;
        let total_items = all_ids.len() as u64;
        Ok(CategoryMeta {
            total_items,
            total_pages: pagination::total_pages(total_items, self.options.page_size),
            last_build: OffsetDateTime::now_utc(),
        })
    }

    /// The category index and whether every category resolved. Incomplete
    /// indexes are served but not cached.
    async fn index(&self, context: Option<&str>) -> (Vec<CategoryEntry>, bool) {
        let key = CacheKey::categories(context);
        if let Lookup::Hit(entries) = self.cache.get::<Vec<CategoryEntry>>(&key) {
            return (entries, true);
        }

        let categories = match self.providers().list_categories().await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "category listing failed");
                return (Vec::new(), false);
            }
        };

        let mut complete = true;
        let mut entries = Vec::new();
        for claimed in categories {
            let meta = match self.load_meta(&claimed).await {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(category = %claimed.category.slug, error = %err, "skipping category in index");
                    complete = false;
                    continue;
                }
            };
            if meta.total_items == 0 {
                continue;
            }

            let name = self.hooks.category_name(&claimed.category);
            for page in 1..=meta.total_pages {
                entries.push(CategoryEntry {
                    slug: claimed.category.slug.clone(),
                    name: name.clone(),
                    item_count: meta.total_items,
                    page,
                    total_pages: meta.total_pages,
                    page_size: self.options.page_size,
                    url_suffix: pagination::url_suffix(page),
                });
            }
        }

        let entries = self.hooks.index_entries(context, entries);
        if complete {
            self.cache.set(&key, &entries);
        }
        (entries, complete)
    }

    fn index_link(&self, entry: &CategoryEntry) -> LinkItem {
        let label = if entry.total_pages > 1 {
            format!("{} ({}/{})", entry.name, entry.page, entry.total_pages)
        } else {
            entry.name.clone()
        };
        LinkItem::new(label, self.options.page_link(&entry.slug, entry.page))
    }

    fn render_rows(
        &self,
        category: &Category,
        rows: &[ItemRow],
    ) -> Result<String, TemplateRenderError> {
        if rows.is_empty() {
            return self.renderer.render(&[]);
        }
        let section = Section {
            label: self.hooks.category_name(category),
            css_classes: format!("category-listing category-{}", category.slug),
            items: rows
                .iter()
                .map(|row| LinkItem::new(row.label(), self.options.item_link(row)))
                .collect(),
        };
        self.renderer.render(&[section])
    }

    fn placeholder(&self) -> String {
        self.renderer.render(&[]).unwrap_or_else(|err| {
            warn!(error = %err, "placeholder render failed");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::cache::{CacheConfig, MemoryStore};
    use crate::domain::types::ContentStatus;
    use crate::infra::memory::{MemoryContentRepo, StoredItem};
    use crate::presentation::TemplateRenderer;

    fn service(repo: Arc<MemoryContentRepo>, page_size: u32) -> ListingService {
        let config = CacheConfig::default();
        let cache = Arc::new(CacheLayer::new(
            config.clone(),
            Arc::new(MemoryStore::new(&config)),
        ));
        let hooks = Arc::new(Hooks::new());
        let resolver = Arc::new(IdentityResolver::new(
            cache.clone(),
            ProviderChain::standard(repo.clone(), Vec::new()),
            hooks.clone(),
            vec!["post".to_string()],
        ));
        let materializer = Arc::new(RowMaterializer::new(cache.clone(), repo, hooks.clone()));
        ListingService::new(
            cache,
            resolver,
            materializer,
            Arc::new(TemplateRenderer::new("empty")),
            hooks,
            ListingOptions {
                page_size,
                ..Default::default()
            },
        )
    }

    fn repo_with(count: i64) -> Arc<MemoryContentRepo> {
        let repo = Arc::new(MemoryContentRepo::new());
        repo.add_term(1, "news", "News", None);
        repo.add_term(2, "empty", "Empty", None);
        let base = datetime!(2024-01-01 0:00 UTC);
        for id in 1..=count {
            repo.insert_item(
                StoredItem::new(
                    id,
                    "post",
                    ContentStatus::Published,
                    base + time::Duration::minutes(id),
                ),
                &[1],
            );
        }
        repo
    }

    #[tokio::test]
    async fn out_of_range_page_renders_placeholder_without_caching() {
        let listing = service(repo_with(3), 2);
        let html = listing.category_page_fragment("news", 5).await;
        assert!(html.contains("listing-empty"));
        assert!(listing.page_ids("news", 5).await.is_empty());
        assert!(
            !listing
                .cache()
                .registry()
                .keys_for_category("news")
                .contains(&CacheKey::html("news", 5))
        );
    }

    #[tokio::test]
    async fn page_zero_is_empty() {
        let listing = service(repo_with(3), 2);
        assert!(listing.page_rows("news", 0).await.is_empty());
        assert!(
            listing
                .category_page_fragment("news", 0)
                .await
                .contains("listing-empty")
        );
    }

    #[tokio::test]
    async fn meta_reports_ceiling_pages() {
        let listing = service(repo_with(5), 2);
        let meta = listing.category_meta("news").await;
        assert_eq!(meta.total_items, 5);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(listing.category_meta("missing").await.total_items, 0);
    }

    #[tokio::test]
    async fn index_has_one_entry_per_page_and_skips_empty_categories() {
        let listing = service(repo_with(5), 2);
        let entries = listing.list_categories(None).await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|entry| entry.slug == "news"));
        assert_eq!(entries[0].url_suffix, "");
        assert_eq!(entries[2].url_suffix, "page/3");
        assert_eq!(entries[1].page_size, 2);
    }

    #[tokio::test]
    async fn breadcrumbs_include_page_past_first() {
        let listing = service(repo_with(5), 2);
        let crumbs = listing.breadcrumbs("news", 2).await;
        let labels: Vec<_> = crumbs.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Home", "News", "Page 2"]);
        assert_eq!(crumbs[2].link, "/news/page/2");

        assert_eq!(listing.breadcrumbs("news", 1).await.len(), 2);
        assert_eq!(listing.breadcrumbs("missing", 1).await.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_serves_placeholder_and_recovers() {
        let repo = repo_with(3);
        let listing = service(repo.clone(), 2);

        repo.set_failing(true);
        assert!(
            listing
                .category_page_fragment("news", 1)
                .await
                .contains("listing-empty")
        );

        repo.set_failing(false);
        let html = listing.category_page_fragment("news", 1).await;
        assert!(html.contains("/posts/item-3"));
    }

    #[test]
    fn links_join_prefixes() {
        let options = ListingOptions {
            link_prefix: "/category/".into(),
            ..Default::default()
        };
        assert_eq!(options.category_link("news"), "/category/news");
        assert_eq!(options.page_link("news", 1), "/category/news");
        assert_eq!(options.page_link("news", 3), "/category/news/page/3");
    }
}
