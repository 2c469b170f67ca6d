//! Deferred regeneration jobs keyed by phase and category.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::gauge;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const METRIC_JOBS_PENDING: &str = "folio_jobs_pending";

/// Rebuild stage a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fast,
    Slow,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Fast => "fast",
            Phase::Slow => "slow",
        }
    }
}

/// Identity of a pending job. At most one job per key is pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub phase: Phase,
    pub category: String,
}

impl JobKey {
    pub fn fast(category: &str) -> Self {
        Self {
            phase: Phase::Fast,
            category: category.to_string(),
        }
    }

    pub fn slow(category: &str) -> Self {
        Self {
            phase: Phase::Slow,
            category: category.to_string(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "regenerate_{}:{}", self.phase.as_str(), self.category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// First page the job rebuilds.
    pub start_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationJob {
    pub id: Uuid,
    pub key: JobKey,
    pub payload: JobPayload,
    pub run_at: OffsetDateTime,
    pub enqueued_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Scheduled,
    /// A pending job with the same key was replaced.
    Replaced,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue unavailable: {0}")]
    Unavailable(String),
}

/// Deferred execution keyed by [`JobKey`].
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedule `payload` at `run_at`, replacing any pending job sharing `key`.
    async fn enqueue(
        &self,
        key: JobKey,
        run_at: OffsetDateTime,
        payload: JobPayload,
    ) -> Result<EnqueueOutcome, QueueError>;

    /// Remove and return every job due at `now`, earliest first.
    async fn take_due(&self, now: OffsetDateTime) -> Result<Vec<RegenerationJob>, QueueError>;

    async fn next_due(&self) -> Result<Option<OffsetDateTime>, QueueError>;

    async fn pending(&self) -> Result<Vec<RegenerationJob>, QueueError>;

    /// Drop every pending job, returning how many were dropped.
    async fn flush(&self) -> Result<usize, QueueError>;
}

/// In-process queue. Pending jobs are lost on restart, which only delays
/// a rebuild until the next transition, read, or rewarm.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: DashMap<JobKey, RegenerationJob>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_pending(&self) {
        gauge!(METRIC_JOBS_PENDING).set(self.jobs.len() as f64);
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(
        &self,
        key: JobKey,
        run_at: OffsetDateTime,
        payload: JobPayload,
    ) -> Result<EnqueueOutcome, QueueError> {
        let job = RegenerationJob {
            id: Uuid::new_v4(),
            key: key.clone(),
            payload,
            run_at,
            enqueued_at: OffsetDateTime::now_utc(),
        };
        let outcome = match self.jobs.insert(key, job) {
            Some(_) => EnqueueOutcome::Replaced,
            None => EnqueueOutcome::Scheduled,
        };
        self.record_pending();
        Ok(outcome)
    }

    async fn take_due(&self, now: OffsetDateTime) -> Result<Vec<RegenerationJob>, QueueError> {
        let due_keys: Vec<JobKey> = self
            .jobs
            .iter()
            .filter(|entry| entry.run_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        // A job replaced since the scan may have moved into the future.
        let mut due: Vec<RegenerationJob> = due_keys
            .iter()
            .filter_map(|key| self.jobs.remove_if(key, |_, job| job.run_at <= now))
            .map(|(_, job)| job)
            .collect();
        due.sort_by(|a, b| a.run_at.cmp(&b.run_at).then_with(|| a.id.cmp(&b.id)));

        self.record_pending();
        Ok(due)
    }

    async fn next_due(&self) -> Result<Option<OffsetDateTime>, QueueError> {
        Ok(self.jobs.iter().map(|entry| entry.run_at).min())
    }

    async fn pending(&self) -> Result<Vec<RegenerationJob>, QueueError> {
        let mut jobs: Vec<RegenerationJob> =
            self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by(|a, b| a.run_at.cmp(&b.run_at));
        Ok(jobs)
    }

    async fn flush(&self) -> Result<usize, QueueError> {
        let dropped = self.jobs.len();
        self.jobs.clear();
        self.record_pending();
        Ok(dropped)
    }
}
