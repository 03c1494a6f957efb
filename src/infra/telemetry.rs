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

/// Install a global tracing subscriber writing to stderr, leaving stdout to
/// the rendered screen.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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

/// Register descriptions for every metric the query cache emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "ipsum_query_cache_hit_total",
            Unit::Count,
            "Total number of queries answered from fresh cached data."
        );
        describe_counter!(
            "ipsum_query_cache_miss_total",
            Unit::Count,
            "Total number of queries that needed a fetch."
        );
        describe_counter!(
            "ipsum_query_fetch_total",
            Unit::Count,
            "Total number of fetches started."
        );
        describe_counter!(
            "ipsum_query_fetch_coalesced_total",
            Unit::Count,
            "Total number of requests joined to an in-flight fetch."
        );
        describe_counter!(
            "ipsum_query_fetch_error_total",
            Unit::Count,
            "Total number of fetches that failed after retries."
        );
        describe_histogram!(
            "ipsum_query_fetch_ms",
            Unit::Milliseconds,
            "Fetch latency in milliseconds, retries included."
        );
        describe_gauge!(
            "ipsum_query_cache_entries",
            Unit::Count,
            "Current number of query cache entries."
        );
    });
}
