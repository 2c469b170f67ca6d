//! Debounced regeneration scheduling.
//!
//! `schedule` pushes a fast-phase job one debounce window into the future.
//! Repeated calls before it fires replace the pending job, so a burst of
//! edits collapses into a single rebuild.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use super::queue::{EnqueueOutcome, JobKey, JobPayload, JobQueue, QueueError};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(60);
pub const DEFAULT_SLOW_PHASE_DELAY: Duration = Duration::from_secs(3600);
pub const DEFAULT_FAST_PHASE_PAGES: u32 = 5;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub debounce: Duration,
    pub slow_phase_delay: Duration,
    /// Pages rebuilt eagerly by the fast phase.
    pub fast_phase_pages: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            slow_phase_delay: DEFAULT_SLOW_PHASE_DELAY,
            fast_phase_pages: DEFAULT_FAST_PHASE_PAGES,
        }
    }
}

pub struct RegenerationScheduler {
    queue: Arc<dyn JobQueue>,
    options: SchedulerOptions,
}

impl RegenerationScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, options: SchedulerOptions) -> Self {
        Self { queue, options }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Queue a debounced fast-phase rebuild of `category`.
    pub async fn schedule(&self, category: &str) -> Result<EnqueueOutcome, QueueError> {
        let run_at = after(self.options.debounce);
        let outcome = self
            .queue
            .enqueue(JobKey::fast(category), run_at, JobPayload { start_page: 1 })
            .await?;
        debug!(category, ?outcome, %run_at, "scheduled fast-phase rebuild");
        Ok(outcome)
    }

    /// Queue the deferred slow phase, starting at `start_page`.
    pub async fn schedule_slow(
        &self,
        category: &str,
        start_page: u32,
    ) -> Result<EnqueueOutcome, QueueError> {
        let run_at = after(self.options.slow_phase_delay);
        let outcome = self
            .queue
            .enqueue(JobKey::slow(category), run_at, JobPayload { start_page })
            .await?;
        debug!(category, start_page, ?outcome, %run_at, "scheduled slow-phase rebuild");
        Ok(outcome)
    }
}

fn after(delay: Duration) -> OffsetDateTime {
    let delay = time::Duration::try_from(delay).unwrap_or(time::Duration::MAX);
    OffsetDateTime::now_utc().saturating_add(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::jobs::queue::{MemoryJobQueue, Phase};

    #[tokio::test]
    async fn repeated_schedules_coalesce() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = RegenerationScheduler::new(queue.clone(), SchedulerOptions::default());

        assert_eq!(
            scheduler.schedule("news").await.unwrap(),
            EnqueueOutcome::Scheduled
        );
        assert_eq!(
            scheduler.schedule("news").await.unwrap(),
            EnqueueOutcome::Replaced
        );
        assert_eq!(
            scheduler.schedule("news").await.unwrap(),
            EnqueueOutcome::Replaced
        );
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn jobs_are_deferred_by_their_phase_delay() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = RegenerationScheduler::new(queue.clone(), SchedulerOptions::default());
        let before = OffsetDateTime::now_utc();

        scheduler.schedule("news").await.unwrap();
        scheduler.schedule_slow("news", 6).await.unwrap();

        let pending = queue.pending().await.unwrap();
        let fast = pending.iter().find(|j| j.key.phase == Phase::Fast).unwrap();
        let slow = pending.iter().find(|j| j.key.phase == Phase::Slow).unwrap();
        assert!(fast.run_at >= before + time::Duration::seconds(60));
        assert!(slow.run_at >= before + time::Duration::seconds(3600));
        assert_eq!(slow.payload.start_page, 6);
        assert!(queue.take_due(OffsetDateTime::now_utc()).await.unwrap().is_empty());
    }
}
