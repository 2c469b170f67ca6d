//! Periodic and startup rewarm.
//!
//! The cron worker schedules a debounced rebuild for every category so
//! long-lived entries (category index, root fragment, untouched pages)
//! are refreshed even without content transitions.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use apalis_cron::Schedule;
use tracing::{info, warn};

use crate::application::listing::{ListingService, RebuildError};

use super::job_failed;
use super::regenerate::RegenerationError;
use super::scheduler::RegenerationScheduler;

pub const DEFAULT_REWARM_CRON: &str = "0 0 3 * * *";

/// Marker job emitted by the cron stream.
/// The cron stream builds one per firing from its timestamp.
#[derive(Default, Debug, Clone)]
pub struct RewarmTick;

impl From<chrono::DateTime<chrono::Utc>> for RewarmTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct RewarmContext {
    pub listing: Arc<ListingService>,
    pub scheduler: Arc<RegenerationScheduler>,
}

/// Schedule a rebuild for every listed category. Returns how many were scheduled.
pub async fn schedule_all(
    listing: &ListingService,
    scheduler: &RegenerationScheduler,
) -> Result<usize, RegenerationError> {
    let slugs = listing
        .category_slugs()
        .await
        .map_err(RebuildError::from)?;
    for slug in &slugs {
        scheduler.schedule(slug).await?;
    }
    Ok(slugs.len())
}

pub async fn process_rewarm_job(
    _tick: RewarmTick,
    ctx: Data<RewarmContext>,
) -> Result<(), ApalisError> {
    match schedule_all(&ctx.listing, &ctx.scheduler).await {
        Ok(count) => {
            info!(categories = count, "scheduled periodic rewarm");
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "periodic rewarm failed");
            Err(job_failed(err))
        }
    }
}

/// Parse a six-field cron expression (seconds first).
pub fn rewarm_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| err.to_string())
}
