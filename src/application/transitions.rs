//! Write-trigger path.
//!
//! Content-state transitions that cross the published boundary schedule a
//! debounced rebuild of every category the item is listed in.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::hooks::{HookError, Hooks};
use crate::application::jobs::{QueueError, RegenerationScheduler};
use crate::application::providers::ProviderChain;
use crate::application::repos::RepoError;
use crate::domain::entities::ContentItem;
use crate::domain::types::{ContentStatus, crosses_publish_boundary};

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct TransitionHandler {
    providers: ProviderChain,
    hooks: Arc<Hooks>,
    scheduler: Arc<RegenerationScheduler>,
    content_types: Vec<String>,
}

impl TransitionHandler {
    pub fn new(
        providers: ProviderChain,
        hooks: Arc<Hooks>,
        scheduler: Arc<RegenerationScheduler>,
        content_types: Vec<String>,
    ) -> Self {
        Self {
            providers,
            hooks,
            scheduler,
            content_types,
        }
    }

    /// Returns the category slugs a rebuild was scheduled for.
    pub async fn on_content_state_changed(
        &self,
        new_status: ContentStatus,
        old_status: ContentStatus,
        item: &ContentItem,
    ) -> Result<Vec<String>, TransitionError> {
        if !crosses_publish_boundary(new_status, old_status) {
            debug!(item_id = item.id, "transition stays on one side of publish");
            return Ok(Vec::new());
        }
        if !self.content_types.contains(&item.content_type) {
            debug!(
                item_id = item.id,
                content_type = %item.content_type,
                "content type is not monitored"
            );
            return Ok(Vec::new());
        }

        let slugs: Vec<String> = self
            .providers
            .categories_for_item(item)
            .await?
            .into_iter()
            .map(|category| category.slug)
            .collect();
        let mut slugs = self.hooks.item_categories(item, slugs).await?;
        let mut seen = HashSet::new();
        slugs.retain(|slug| seen.insert(slug.clone()));

        for slug in &slugs {
            self.scheduler.schedule(slug).await?;
        }

        info!(
            item_id = item.id,
            from = old_status.as_str(),
            to = new_status.as_str(),
            categories = ?slugs,
            "scheduled category rebuilds"
        );
        Ok(slugs)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::application::hooks::{Flow, ItemCategories};
    use crate::application::jobs::{JobQueue, MemoryJobQueue, SchedulerOptions};
    use crate::infra::memory::{MemoryContentRepo, StoredItem};

    struct AlsoFeatured;

    #[async_trait]
    impl ItemCategories for AlsoFeatured {
        async fn categories(
            &self,
            _item: &ContentItem,
            mut slugs: Vec<String>,
        ) -> Result<Flow<Vec<String>>, HookError> {
            slugs.push("featured".to_string());
            slugs.push("local".to_string());
            Ok(Flow::Continue(slugs))
        }
    }

    fn handler(hooks: Hooks) -> (Arc<MemoryJobQueue>, TransitionHandler) {
        let repo = Arc::new(MemoryContentRepo::new());
        repo.add_term(1, "news", "News", None);
        repo.add_term(2, "local", "Local", Some(1));
        repo.insert_item(
            StoredItem::new(8, "post", ContentStatus::Published, datetime!(2024-02-01 0:00 UTC)),
            &[1, 2],
        );

        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = Arc::new(RegenerationScheduler::new(
            queue.clone(),
            SchedulerOptions::default(),
        ));
        let handler = TransitionHandler::new(
            ProviderChain::standard(repo, Vec::new()),
            Arc::new(hooks),
            scheduler,
            vec!["post".to_string()],
        );
        (queue, handler)
    }

    fn item() -> ContentItem {
        ContentItem {
            id: 8,
            content_type: "post".to_string(),
            status: Some(ContentStatus::Published),
        }
    }

    #[tokio::test]
    async fn unpublishing_schedules_the_deepest_term() {
        let (queue, handler) = handler(Hooks::new());
        let slugs = handler
            .on_content_state_changed(ContentStatus::Trash, ContentStatus::Published, &item())
            .await
            .unwrap();
        assert_eq!(slugs, vec!["local".to_string()]);
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hook_categories_are_added_once() {
        let (queue, handler) = handler(Hooks::new().with_item_categories(Arc::new(AlsoFeatured)));
        let slugs = handler
            .on_content_state_changed(ContentStatus::Published, ContentStatus::Draft, &item())
            .await
            .unwrap();
        assert_eq!(slugs, vec!["local".to_string(), "featured".to_string()]);
        assert_eq!(queue.pending().await.unwrap().len(), 2);
    }
}
