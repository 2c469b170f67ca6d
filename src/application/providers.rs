//! Category providers.
//!
//! A provider claims category slugs and answers which items belong to them.
//! [`ProviderChain`] asks providers in priority order; the first one that
//! claims a slug owns it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::repos::{ContentRepo, RepoError};
use crate::domain::entities::{Category, ContentItem, ItemStamp, TermRecord};

#[async_trait]
pub trait CategoryProvider: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Returns the category when this provider owns `slug`.
    async fn lookup(&self, slug: &str) -> Result<Option<Category>, RepoError>;

    /// Published items of `category`, in no particular order.
    async fn stamps(
        &self,
        category: &Category,
        content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError>;

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError>;

    /// Categories whose listings change when `item` is published or withdrawn.
    async fn categories_for_item(&self, item: &ContentItem) -> Result<Vec<Category>, RepoError>;
}

/// Primary provider backed by taxonomy terms.
pub struct TaxonomyProvider {
    repo: Arc<dyn ContentRepo>,
}

impl TaxonomyProvider {
    pub fn new(repo: Arc<dyn ContentRepo>) -> Self {
        Self { repo }
    }
}

fn term_category(term: TermRecord) -> Category {
    Category {
        slug: term.slug,
        name: term.name,
    }
}

/// The most specific term: greatest depth, ties broken by the smallest id.
pub fn deepest_term(terms: Vec<TermRecord>) -> Option<TermRecord> {
    terms
        .into_iter()
        .min_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.id.cmp(&b.id)))
}

#[async_trait]
impl CategoryProvider for TaxonomyProvider {
    fn kind(&self) -> &'static str {
        "taxonomy"
    }

    async fn lookup(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        Ok(self.repo.find_term(slug).await?.map(term_category))
    }

    async fn stamps(
        &self,
        category: &Category,
        content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError> {
        self.repo
            .term_item_stamps(&category.slug, content_types)
            .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        let terms = self.repo.list_terms().await?;
        Ok(terms.into_iter().map(term_category).collect())
    }

    async fn categories_for_item(&self, item: &ContentItem) -> Result<Vec<Category>, RepoError> {
        let terms = self.repo.terms_for_item(item.id).await?;
        Ok(deepest_term(terms).map(term_category).into_iter().collect())
    }
}

/// A virtual category listing every published item of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualCategory {
    pub slug: String,
    pub name: String,
    pub content_type: String,
}

impl VirtualCategory {
    fn category(&self) -> Category {
        Category {
            slug: self.slug.clone(),
            name: self.name.clone(),
        }
    }
}

/// Secondary provider folding content types into the category space.
pub struct ContentTypeProvider {
    repo: Arc<dyn ContentRepo>,
    categories: Vec<VirtualCategory>,
}

impl ContentTypeProvider {
    pub fn new(repo: Arc<dyn ContentRepo>, categories: Vec<VirtualCategory>) -> Self {
        Self { repo, categories }
    }

    fn find(&self, slug: &str) -> Option<&VirtualCategory> {
        self.categories.iter().find(|candidate| candidate.slug == slug)
    }
}

#[async_trait]
impl CategoryProvider for ContentTypeProvider {
    fn kind(&self) -> &'static str {
        "content_type"
    }

    async fn lookup(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        Ok(self.find(slug).map(VirtualCategory::category))
    }

    async fn stamps(
        &self,
        category: &Category,
        _content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError> {
        match self.find(&category.slug) {
            Some(virtual_category) => {
                self.repo
                    .type_item_stamps(&virtual_category.content_type)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        Ok(self.categories.iter().map(VirtualCategory::category).collect())
    }

    async fn categories_for_item(&self, item: &ContentItem) -> Result<Vec<Category>, RepoError> {
        Ok(self
            .categories
            .iter()
            .filter(|candidate| candidate.content_type == item.content_type)
            .map(VirtualCategory::category)
            .collect())
    }
}

/// A category together with the provider that claimed it.
#[derive(Clone)]
pub struct ClaimedCategory {
    pub category: Category,
    pub provider: Arc<dyn CategoryProvider>,
}

/// Providers in priority order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn CategoryProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn CategoryProvider>>) -> Self {
        Self { providers }
    }

    /// Virtual categories first, taxonomy last.
    pub fn standard(repo: Arc<dyn ContentRepo>, virtual_categories: Vec<VirtualCategory>) -> Self {
        let mut providers: Vec<Arc<dyn CategoryProvider>> = Vec::new();
        if !virtual_categories.is_empty() {
            providers.push(Arc::new(ContentTypeProvider::new(
                repo.clone(),
                virtual_categories,
            )));
        }
        providers.push(Arc::new(TaxonomyProvider::new(repo)));
        Self { providers }
    }

    pub async fn claim(&self, slug: &str) -> Result<Option<ClaimedCategory>, RepoError> {
        for provider in &self.providers {
            if let Some(category) = provider.lookup(slug).await? {
                return Ok(Some(ClaimedCategory {
                    category,
                    provider: provider.clone(),
                }));
            }
        }
        Ok(None)
    }

    /// Every category, in provider priority order. A slug claimed by an
    /// earlier provider hides the same slug from later ones.
    pub async fn list_categories(&self) -> Result<Vec<ClaimedCategory>, RepoError> {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();
        for provider in &self.providers {
            for category in provider.list_categories().await? {
                if seen.insert(category.slug.clone()) {
                    categories.push(ClaimedCategory {
                        category,
                        provider: provider.clone(),
                    });
                }
            }
        }
        Ok(categories)
    }

    pub async fn categories_for_item(&self, item: &ContentItem) -> Result<Vec<Category>, RepoError> {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();
        for provider in &self.providers {
            for category in provider.categories_for_item(item).await? {
                if seen.insert(category.slug.clone()) {
                    categories.push(category);
                }
            }
        }
        Ok(categories)
    }
}
