//! Polling worker that runs due regeneration jobs.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info_span, warn};

use super::queue::{JobQueue, QueueError, RegenerationJob};
use super::regenerate::{PhaseReport, Regenerator};

const METRIC_REGENERATION_FAILED: &str = "folio_regeneration_failed_total";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Jobs handled by one [`RegenerationWorker::run_due`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerTick {
    pub completed: Vec<PhaseReport>,
    pub failed: usize,
}

/// Pulls due jobs off the queue and runs them one at a time.
pub struct RegenerationWorker {
    queue: Arc<dyn JobQueue>,
    regenerator: Arc<Regenerator>,
    poll_interval: Duration,
}

impl RegenerationWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        regenerator: Arc<Regenerator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            regenerator,
            poll_interval,
        }
    }

    /// Run every job due at `now`. A failed job is logged and dropped.
    pub async fn run_due(&self, now: OffsetDateTime) -> Result<WorkerTick, QueueError> {
        let mut tick = WorkerTick::default();
        for job in self.queue.take_due(now).await? {
            match self.process(&job).await {
                Some(report) => tick.completed.push(report),
                None => tick.failed += 1,
            }
        }
        Ok(tick)
    }

    async fn process(&self, job: &RegenerationJob) -> Option<PhaseReport> {
        let span = info_span!(
            "regeneration_job",
            job_id = %job.id,
            category = %job.key.category,
            phase = job.key.phase.as_str(),
        );
        async {
            match self.regenerator.run(job).await {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!(error = %err, start_page = job.payload.start_page, "regeneration job failed");
                    counter!(METRIC_REGENERATION_FAILED, "phase" => job.key.phase.as_str())
                        .increment(1);
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Poll until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_due(OffsetDateTime::now_utc()).await {
                Ok(tick) if !tick.completed.is_empty() || tick.failed > 0 => {
                    debug!(
                        completed = tick.completed.len(),
                        failed = tick.failed,
                        "worker pass finished"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "job queue poll failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("regeneration worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::application::engine::{EngineOptions, ListingEngine};
    use crate::application::hooks::{HookError, Hooks, RowsPrefetch};
    use crate::application::listing::ListingOptions;
    use crate::cache::CacheKey;
    use crate::domain::entities::{Category, ItemId, RawRow};
    use crate::domain::types::ContentStatus;
    use crate::infra::memory::{MemoryContentRepo, StoredItem};

    /// Fails every fetch of one page.
    struct BrokenPage(u32);

    #[async_trait]
    impl RowsPrefetch for BrokenPage {
        async fn prefetch(
            &self,
            _category: &Category,
            page: u32,
            _ids: &[ItemId],
        ) -> Result<Option<Vec<RawRow>>, HookError> {
            if page == self.0 {
                Err(HookError::failed("broken_page", format!("page {page} unavailable")))
            } else {
                Ok(None)
            }
        }
    }

    fn engine(hooks: Hooks) -> ListingEngine {
        let repo = Arc::new(MemoryContentRepo::new());
        repo.add_term(1, "news", "News", None);
        let base = datetime!(2024-01-01 0:00 UTC);
        for id in 1..=80 {
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
        ListingEngine::build(repo, hooks, options)
    }

    fn html_cached(engine: &ListingEngine, page: u32) -> bool {
        engine
            .cache
            .get::<String>(&CacheKey::html("news", page))
            .is_hit()
    }

    #[tokio::test]
    async fn failed_slow_phase_keeps_finished_pages_and_is_not_requeued() {
        let engine = engine(Hooks::new().with_rows_prefetch(Arc::new(BrokenPage(7))));

        let fast = engine.regenerator.run_fast("news").await.unwrap();
        assert!(fast.slow_phase_scheduled);

        let after_slow_delay = OffsetDateTime::now_utc() + time::Duration::seconds(3601);
        let tick = engine.worker.run_due(after_slow_delay).await.unwrap();
        assert!(tick.completed.is_empty());
        assert_eq!(tick.failed, 1);

        for page in 1..=6 {
            assert!(html_cached(&engine, page), "page {page} should stay cached");
        }
        assert!(!html_cached(&engine, 7));
        assert!(!html_cached(&engine, 8));
        assert!(engine.queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jobs_not_yet_due_stay_queued() {
        let engine = engine(Hooks::new());
        engine.scheduler.schedule("news").await.unwrap();

        let tick = engine.worker.run_due(OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(tick, WorkerTick::default());
        assert_eq!(engine.queue.pending().await.unwrap().len(), 1);
    }
}
