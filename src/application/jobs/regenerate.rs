//! Fast and slow rebuild phases of a category.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::application::invalidator::Invalidator;
use crate::application::listing::{ListingService, RebuildError};

use super::queue::{Phase, QueueError, RegenerationJob};
use super::scheduler::RegenerationScheduler;

const METRIC_REGENERATION_MS: &str = "folio_regeneration_ms";

#[derive(Debug, Error)]
pub enum RegenerationError {
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Outcome of one phase run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub category: String,
    pub phase: Phase,
    pub total_pages: u32,
    pub pages_built: u32,
    pub slow_phase_scheduled: bool,
}

impl PhaseReport {
    fn noop(category: &str, phase: Phase, total_pages: u32) -> Self {
        Self {
            category: category.to_string(),
            phase,
            total_pages,
            pages_built: 0,
            slow_phase_scheduled: false,
        }
    }
}

/// Runs the fast and slow rebuild phases of a category.
pub struct Regenerator {
    invalidator: Arc<Invalidator>,
    listing: Arc<ListingService>,
    scheduler: Arc<RegenerationScheduler>,
}

impl Regenerator {
    pub fn new(
        invalidator: Arc<Invalidator>,
        listing: Arc<ListingService>,
        scheduler: Arc<RegenerationScheduler>,
    ) -> Self {
        Self {
            invalidator,
            listing,
            scheduler,
        }
    }

    pub async fn run(&self, job: &RegenerationJob) -> Result<PhaseReport, RegenerationError> {
        let started = Instant::now();
        let report = match job.key.phase {
            Phase::Fast => self.run_fast(&job.key.category).await,
            Phase::Slow => {
                self.run_slow(&job.key.category, job.payload.start_page)
                    .await
            }
        };
        histogram!(METRIC_REGENERATION_MS, "phase" => job.key.phase.as_str())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        report
    }

    /// Purge the category, recompute its identifiers and totals, rebuild the
    /// leading pages, and defer the rest to the slow phase.
    pub async fn run_fast(&self, category: &str) -> Result<PhaseReport, RegenerationError> {
        self.invalidator.invalidate(category);
        let meta = self.listing.refresh_category(category).await?;
        if meta.total_pages < 1 {
            return Ok(PhaseReport::noop(category, Phase::Fast, 0));
        }

        let fast_pages = self.scheduler.options().fast_phase_pages;
        let last = fast_pages.min(meta.total_pages);
        let mut pages_built = 0;
        for page in 1..=last {
            if self.listing.rebuild_page(category, page).await? {
                pages_built += 1;
            }
        }

        let slow_phase_scheduled = meta.total_pages > fast_pages;
        if slow_phase_scheduled {
            self.scheduler
                .schedule_slow(category, fast_pages.saturating_add(1))
                .await?;
        }

        // Warm the global summaries the invalidation dropped.
        self.listing.root_fragment().await;

        info!(
            category,
            phase = "fast",
            total_items = meta.total_items,
            total_pages = meta.total_pages,
            pages_built,
            slow_phase_scheduled,
            "fast-phase rebuild finished"
        );
        Ok(PhaseReport {
            category: category.to_string(),
            phase: Phase::Fast,
            total_pages: meta.total_pages,
            pages_built,
            slow_phase_scheduled,
        })
    }

    /// Rebuild pages `start_page..=total_pages` in order. Stops at the first
    /// failure; pages already rebuilt stay cached.
    pub async fn run_slow(
        &self,
        category: &str,
        start_page: u32,
    ) -> Result<PhaseReport, RegenerationError> {
        let meta = self.listing.refresh_meta(category).await?;
        if meta.total_pages < 1 {
            return Ok(PhaseReport::noop(category, Phase::Slow, 0));
        }

        let start = start_page.max(1);
        if start > meta.total_pages {
            return Ok(PhaseReport::noop(category, Phase::Slow, meta.total_pages));
        }

        let mut pages_built = 0;
        for page in start..=meta.total_pages {
            if self.listing.rebuild_page(category, page).await? {
                pages_built += 1;
            }
        }

        info!(
            category,
            phase = "slow",
            start,
            total_pages = meta.total_pages,
            pages_built,
            "slow-phase rebuild finished"
        );
        Ok(PhaseReport {
            category: category.to_string(),
            phase: Phase::Slow,
            total_pages: meta.total_pages,
            pages_built,
            slow_phase_scheduled: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::engine::{EngineOptions, ListingEngine};
    use crate::application::hooks::Hooks;
    use crate::application::listing::ListingOptions;
    use crate::domain::types::ContentStatus;
    use crate::infra::memory::{MemoryContentRepo, StoredItem};

    fn engine(items: i64) -> (Arc<MemoryContentRepo>, ListingEngine) {
        let repo = Arc::new(MemoryContentRepo::new());
        repo.add_term(1, "news", "News", None);
        repo.add_term(2, "empty", "Empty", None);
        let base = datetime!(2024-01-01 0:00 UTC);
        for id in 1..=items {
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
        let options = EngineOptions {
            listing: ListingOptions {
                page_size: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = ListingEngine::build(repo.clone(), Hooks::new(), options);
        (repo, engine)
    }

    #[tokio::test]
    async fn empty_category_phases_do_nothing() {
        let (_, engine) = engine(5);

        let fast = engine.regenerator.run_fast("empty").await.unwrap();
        assert_eq!(fast, PhaseReport::noop("empty", Phase::Fast, 0));

        let slow = engine.regenerator.run_slow("empty", 6).await.unwrap();
        assert_eq!(slow, PhaseReport::noop("empty", Phase::Slow, 0));

        assert!(engine.queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_phase_start_is_clamped_to_the_first_page() {
        let (_, engine) = engine(25);
        let report = engine.regenerator.run_slow("news", 0).await.unwrap();
        assert_eq!(report.total_pages, 3);
        assert_eq!(report.pages_built, 3);
    }

    #[tokio::test]
    async fn pending_slow_job_is_a_noop_after_the_category_shrinks() {
        let (repo, engine) = engine(80);

        let fast = engine.regenerator.run_fast("news").await.unwrap();
        assert!(fast.slow_phase_scheduled);
        let pending = engine.queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        let slow_job = pending[0].clone();
        assert_eq!(slow_job.payload.start_page, 6);

        for id in 31..=80 {
            repo.set_status(id, ContentStatus::Draft);
        }
        let fast = engine.regenerator.run_fast("news").await.unwrap();
        assert_eq!(fast.total_pages, 3);
        assert!(!fast.slow_phase_scheduled);

        let report = engine.regenerator.run(&slow_job).await.unwrap();
        assert_eq!(report, PhaseReport::noop("news", Phase::Slow, 3));
    }
}
