//! Background regeneration: deferred queue, debounced scheduler, phase
//! runner, polling worker, and the periodic rewarm.

mod queue;
mod regenerate;
mod rewarm;
mod scheduler;
mod worker;

use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

pub use queue::{
    EnqueueOutcome, JobKey, JobPayload, JobQueue, MemoryJobQueue, Phase, QueueError,
    RegenerationJob,
};
pub use regenerate::{PhaseReport, RegenerationError, Regenerator};
pub use rewarm::{
    DEFAULT_REWARM_CRON, RewarmContext, RewarmTick, process_rewarm_job, rewarm_schedule,
    schedule_all,
};
pub use scheduler::{
    DEFAULT_DEBOUNCE, DEFAULT_FAST_PHASE_PAGES, DEFAULT_SLOW_PHASE_DELAY, RegenerationScheduler,
    SchedulerOptions,
};
pub use worker::{DEFAULT_POLL_INTERVAL, RegenerationWorker, WorkerTick};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
