//! Extension registry.
//!
//! Each extension point holds an ordered list of strategies. They run in
//! registration order; each one either passes its value on with
//! [`Flow::Continue`] or ends the chain with [`Flow::Halt`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::entities::{Category, CategoryEntry, ContentItem, Crumb, ItemId, RawRow};

/// Outcome of a single hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<T> {
    /// Hand the value to the next hook.
    Continue(T),
    /// Stop here; later hooks are skipped.
    Halt(T),
}

impl<T> Flow<T> {
    pub fn into_inner(self) -> T {
        match self {
            Flow::Continue(value) | Flow::Halt(value) => value,
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook `{hook}` failed: {message}")]
    Failed { hook: String, message: String },
    #[error("hook returned malformed data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl HookError {
    pub fn failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Replaces or alters the ordered identifier list of a category.
#[async_trait]
pub trait IdsOverride: Send + Sync {
    async fn override_ids(
        &self,
        category: &Category,
        ids: Vec<ItemId>,
    ) -> Result<Flow<Vec<ItemId>>, HookError>;
}

/// Supplies the rows of a page instead of the content store.
///
/// `Ok(None)` declines; the first `Some` wins.
#[async_trait]
pub trait RowsPrefetch: Send + Sync {
    async fn prefetch(
        &self,
        category: &Category,
        page: u32,
        ids: &[ItemId],
    ) -> Result<Option<Vec<RawRow>>, HookError>;
}

/// Post-fetch transform of a page's rows. Output is normalized afterwards.
pub trait RowsTransform: Send + Sync {
    fn transform(&self, category: &Category, page: u32, rows: Vec<RawRow>) -> Flow<Vec<RawRow>>;
}

pub trait CategoryNameOverride: Send + Sync {
    fn name(&self, category: &Category, name: String) -> Flow<String>;
}

/// Injects or rewrites entries of the category index.
pub trait IndexEntries: Send + Sync {
    fn entries(
        &self,
        context: Option<&str>,
        entries: Vec<CategoryEntry>,
    ) -> Flow<Vec<CategoryEntry>>;
}

pub trait BreadcrumbEntries: Send + Sync {
    fn crumbs(&self, category: &Category, page: u32, crumbs: Vec<Crumb>) -> Flow<Vec<Crumb>>;
}

/// Contributes content types whose transitions are monitored and listed.
pub trait ContentTypes: Send + Sync {
    fn content_types(&self, types: Vec<String>) -> Flow<Vec<String>>;
}

/// Contributes extra category slugs affected by an item's transition.
#[async_trait]
pub trait ItemCategories: Send + Sync {
    async fn categories(
        &self,
        item: &ContentItem,
        slugs: Vec<String>,
    ) -> Result<Flow<Vec<String>>, HookError>;
}

/// Registered extension strategies, injected into the resolver,
/// materializer, listing service and transition handler.
#[derive(Clone, Default)]
pub struct Hooks {
    ids_overrides: Vec<Arc<dyn IdsOverride>>,
    rows_prefetch: Vec<Arc<dyn RowsPrefetch>>,
    rows_transforms: Vec<Arc<dyn RowsTransform>>,
    name_overrides: Vec<Arc<dyn CategoryNameOverride>>,
    index_entries: Vec<Arc<dyn IndexEntries>>,
    breadcrumb_entries: Vec<Arc<dyn BreadcrumbEntries>>,
    content_types: Vec<Arc<dyn ContentTypes>>,
    item_categories: Vec<Arc<dyn ItemCategories>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids_override(mut self, hook: Arc<dyn IdsOverride>) -> Self {
        self.ids_overrides.push(hook);
        self
    }

    pub fn with_rows_prefetch(mut self, hook: Arc<dyn RowsPrefetch>) -> Self {
        self.rows_prefetch.push(hook);
        self
    }

    pub fn with_rows_transform(mut self, hook: Arc<dyn RowsTransform>) -> Self {
        self.rows_transforms.push(hook);
        self
    }

    pub fn with_name_override(mut self, hook: Arc<dyn CategoryNameOverride>) -> Self {
        self.name_overrides.push(hook);
        self
    }

    pub fn with_index_entries(mut self, hook: Arc<dyn IndexEntries>) -> Self {
        self.index_entries.push(hook);
        self
    }

    pub fn with_breadcrumb_entries(mut self, hook: Arc<dyn BreadcrumbEntries>) -> Self {
        self.breadcrumb_entries.push(hook);
        self
    }

    pub fn with_content_types(mut self, hook: Arc<dyn ContentTypes>) -> Self {
        self.content_types.push(hook);
        self
    }

    pub fn with_item_categories(mut self, hook: Arc<dyn ItemCategories>) -> Self {
        self.item_categories.push(hook);
        self
    }

    pub async fn apply_ids_overrides(
        &self,
        category: &Category,
        ids: Vec<ItemId>,
    ) -> Result<Vec<ItemId>, HookError> {
        let mut value = ids;
        for hook in &self.ids_overrides {
            match hook.override_ids(category, value).await? {
                Flow::Continue(next) => value = next,
                Flow::Halt(last) => return Ok(last),
            }
        }
        Ok(value)
    }

    pub async fn prefetch_rows(
        &self,
        category: &Category,
        page: u32,
        ids: &[ItemId],
    ) -> Result<Option<Vec<RawRow>>, HookError> {
        for hook in &self.rows_prefetch {
            if let Some(rows) = hook.prefetch(category, page, ids).await? {
                return Ok(Some(rows));
            }
        }
        Ok(None)
    }

    pub fn transform_rows(&self, category: &Category, page: u32, rows: Vec<RawRow>) -> Vec<RawRow> {
        run_chain(&self.rows_transforms, rows, |hook, rows| {
            hook.transform(category, page, rows)
        })
    }

    pub fn category_name(&self, category: &Category) -> String {
        run_chain(&self.name_overrides, category.name.clone(), |hook, name| {
            hook.name(category, name)
        })
    }

    pub fn index_entries(
        &self,
        context: Option<&str>,
        entries: Vec<CategoryEntry>,
    ) -> Vec<CategoryEntry> {
        run_chain(&self.index_entries, entries, |hook, entries| {
            hook.entries(context, entries)
        })
    }

    pub fn breadcrumbs(&self, category: &Category, page: u32, crumbs: Vec<Crumb>) -> Vec<Crumb> {
        run_chain(&self.breadcrumb_entries, crumbs, |hook, crumbs| {
            hook.crumbs(category, page, crumbs)
        })
    }

    /// Monitored content types; duplicates are dropped, first occurrence kept.
    pub fn content_types(&self, base: Vec<String>) -> Vec<String> {
        let mut types = run_chain(&self.content_types, base, |hook, types| {
            hook.content_types(types)
        });
        let mut seen = std::collections::HashSet::new();
        types.retain(|ty| seen.insert(ty.clone()));
        types
    }

    pub async fn item_categories(
        &self,
        item: &ContentItem,
        slugs: Vec<String>,
    ) -> Result<Vec<String>, HookError> {
        let mut value = slugs;
        for hook in &self.item_categories {
            match hook.categories(item, value).await? {
                Flow::Continue(next) => value = next,
                Flow::Halt(last) => return Ok(last),
            }
        }
        Ok(value)
    }
}

fn run_chain<H: ?Sized, T>(
    hooks: &[Arc<H>],
    initial: T,
    mut apply: impl FnMut(&H, T) -> Flow<T>,
) -> T {
    let mut value = initial;
    for hook in hooks {
        match apply(hook.as_ref(), value) {
            Flow::Continue(next) => value = next,
            Flow::Halt(last) => return last,
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Suffix(&'static str, bool);

    impl CategoryNameOverride for Suffix {
        fn name(&self, _category: &Category, name: String) -> Flow<String> {
            let next = format!("{name}{}", self.0);
            if self.1 {
                Flow::Halt(next)
            } else {
                Flow::Continue(next)
            }
        }
    }

    struct Reverse;

    #[async_trait]
    impl IdsOverride for Reverse {
        async fn override_ids(
            &self,
            _category: &Category,
            mut ids: Vec<ItemId>,
        ) -> Result<Flow<Vec<ItemId>>, HookError> {
            ids.reverse();
            Ok(Flow::Continue(ids))
        }
    }

    struct Broken;

    #[async_trait]
    impl IdsOverride for Broken {
        async fn override_ids(
            &self,
            _category: &Category,
            _ids: Vec<ItemId>,
        ) -> Result<Flow<Vec<ItemId>>, HookError> {
            Err(HookError::Malformed("expected a list".into()))
        }
    }

    struct Extra(&'static str);

    impl ContentTypes for Extra {
        fn content_types(&self, mut types: Vec<String>) -> Flow<Vec<String>> {
            types.push(self.0.to_string());
            Flow::Continue(types)
        }
    }

    fn news() -> Category {
        Category {
            slug: "news".into(),
            name: "News".into(),
        }
    }

    #[test]
    fn hooks_run_in_registration_order_until_halt() {
        let hooks = Hooks::new()
            .with_name_override(Arc::new(Suffix(" A", false)))
            .with_name_override(Arc::new(Suffix(" B", true)))
            .with_name_override(Arc::new(Suffix(" C", false)));
        assert_eq!(hooks.category_name(&news()), "News A B");
    }

    #[test]
    fn empty_registry_passes_values_through() {
        let hooks = Hooks::new();
        assert_eq!(hooks.category_name(&news()), "News");
        assert_eq!(
            hooks.content_types(vec!["post".into()]),
            vec!["post".to_string()]
        );
    }

    #[test]
    fn content_types_are_deduplicated() {
        let hooks = Hooks::new()
            .with_content_types(Arc::new(Extra("video")))
            .with_content_types(Arc::new(Extra("post")));
        assert_eq!(
            hooks.content_types(vec!["post".into()]),
            vec!["post".to_string(), "video".to_string()]
        );
    }

    #[tokio::test]
    async fn ids_override_errors_propagate() {
        let hooks = Hooks::new()
            .with_ids_override(Arc::new(Reverse))
            .with_ids_override(Arc::new(Broken));
        assert!(hooks.apply_ids_overrides(&news(), vec![1, 2]).await.is_err());

        let hooks = Hooks::new().with_ids_override(Arc::new(Reverse));
        assert_eq!(
            hooks.apply_ids_overrides(&news(), vec![1, 2]).await.unwrap(),
            vec![2, 1]
        );
    }
}
