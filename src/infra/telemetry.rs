use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Listing cache hits, labelled by layer."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Listing cache misses, labelled by layer."
        );
        describe_counter!(
            "folio_cache_evict_total",
            Unit::Count,
            "Entries evicted from the in-memory store due to capacity."
        );
        describe_counter!(
            "folio_cache_write_failed_total",
            Unit::Count,
            "Cache writes dropped because encoding or the backend failed."
        );
        describe_histogram!(
            "folio_regeneration_ms",
            Unit::Milliseconds,
            "Regeneration job latency in milliseconds, labelled by phase."
        );
        describe_counter!(
            "folio_regeneration_failed_total",
            Unit::Count,
            "Regeneration jobs that failed, labelled by phase."
        );
        describe_gauge!(
            "folio_jobs_pending",
            Unit::Count,
            "Regeneration jobs waiting in the queue."
        );
    });
}
