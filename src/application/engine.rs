//! Wiring of the listing engine.
//!
//! One [`ListingEngine`] is built at startup and handed to the HTTP layer
//! and the background workers.

use std::sync::Arc;
use std::time::Duration;

use crate::application::hooks::Hooks;
use crate::application::invalidator::Invalidator;
use crate::application::jobs::{
    DEFAULT_POLL_INTERVAL, JobQueue, MemoryJobQueue, QueueError, RegenerationScheduler,
    RegenerationWorker, Regenerator, SchedulerOptions,
};
use crate::application::listing::{ListingOptions, ListingService};
use crate::application::materializer::RowMaterializer;
use crate::application::providers::{ProviderChain, VirtualCategory};
use crate::application::repos::ContentRepo;
use crate::application::resolver::IdentityResolver;
use crate::application::transitions::TransitionHandler;
use crate::cache::{CacheBackend, CacheConfig, CacheError, CacheLayer, MemoryStore};
use crate::presentation::{TemplateRenderer, views::DEFAULT_EMPTY_MESSAGE};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub cache: CacheConfig,
    pub listing: ListingOptions,
    pub content_types: Vec<String>,
    pub virtual_categories: Vec<VirtualCategory>,
    pub scheduler: SchedulerOptions,
    pub poll_interval: Duration,
    pub empty_message: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            listing: ListingOptions::default(),
            content_types: vec!["post".to_string()],
            virtual_categories: Vec::new(),
            scheduler: SchedulerOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ListingEngine {
    pub cache: Arc<CacheLayer>,
    pub listing: Arc<ListingService>,
    pub invalidator: Arc<Invalidator>,
    pub queue: Arc<dyn JobQueue>,
    pub scheduler: Arc<RegenerationScheduler>,
    pub regenerator: Arc<Regenerator>,
    pub worker: Arc<RegenerationWorker>,
    pub transitions: Arc<TransitionHandler>,
}

impl ListingEngine {
    /// Engine with the in-memory cache store and job queue.
    pub fn build(repo: Arc<dyn ContentRepo>, hooks: Hooks, options: EngineOptions) -> Self {
        let backend = Arc::new(MemoryStore::new(&options.cache));
        Self::with_backends(
            repo,
            hooks,
            options,
            backend,
            Arc::new(MemoryJobQueue::new()),
        )
    }

    pub fn with_backends(
        repo: Arc<dyn ContentRepo>,
        hooks: Hooks,
        options: EngineOptions,
        backend: Arc<dyn CacheBackend>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let hooks = Arc::new(hooks);
        let cache = Arc::new(CacheLayer::new(options.cache.clone(), backend));
        let virtual_types: Vec<String> = options
            .virtual_categories
            .iter()
            .map(|category| category.content_type.clone())
            .collect();
        let providers = ProviderChain::standard(repo.clone(), options.virtual_categories);

        let resolver = Arc::new(IdentityResolver::new(
            cache.clone(),
            providers.clone(),
            hooks.clone(),
            options.content_types,
        ));
        // Virtual category types are watched for transitions but stay out of
        // taxonomy listings.
        let mut monitored_types = resolver.content_types().to_vec();
        for content_type in virtual_types {
            if !monitored_types.contains(&content_type) {
                monitored_types.push(content_type);
            }
        }
        let materializer = Arc::new(RowMaterializer::new(cache.clone(), repo, hooks.clone()));
        let listing = Arc::new(ListingService::new(
            cache.clone(),
            resolver,
            materializer,
            Arc::new(TemplateRenderer::new(options.empty_message)),
            hooks.clone(),
            options.listing,
        ));

        let invalidator = Arc::new(Invalidator::new(cache.clone()));
        let scheduler = Arc::new(RegenerationScheduler::new(
            queue.clone(),
            options.scheduler,
        ));
        let regenerator = Arc::new(Regenerator::new(
            invalidator.clone(),
            listing.clone(),
            scheduler.clone(),
        ));
        let worker = Arc::new(RegenerationWorker::new(
            queue.clone(),
            regenerator.clone(),
            options.poll_interval,
        ));
        let transitions = Arc::new(TransitionHandler::new(
            providers,
            hooks,
            scheduler.clone(),
            monitored_types,
        ));

        Self {
            cache,
            listing,
            invalidator,
            queue,
            scheduler,
            regenerator,
            worker,
            transitions,
        }
    }

    /// Drop every cache entry under the configured group.
    pub fn flush_cache(&self) -> Result<usize, CacheError> {
        self.cache.flush()
    }

    /// Drop every pending regeneration job.
    pub async fn flush_jobs(&self) -> Result<usize, QueueError> {
        self.queue.flush().await
    }
}
