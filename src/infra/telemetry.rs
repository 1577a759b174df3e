use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::analysis_cache::{
    METRIC_ANALYSIS_COALESCED, METRIC_ANALYSIS_HIT, METRIC_ANALYSIS_MISS,
};
use crate::application::response_cache::{
    METRIC_RESPONSE_COALESCED, METRIC_RESPONSE_HIT, METRIC_RESPONSE_MISS, METRIC_STORAGE_ERROR,
    METRIC_UPSTREAM_MS,
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

/// Register descriptions for every metric the proxy emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_RESPONSE_HIT,
            Unit::Count,
            "Total number of responses served from the response cache."
        );
        describe_counter!(
            METRIC_RESPONSE_MISS,
            Unit::Count,
            "Total number of response-cache misses, including forced refreshes."
        );
        describe_counter!(
            METRIC_RESPONSE_COALESCED,
            Unit::Count,
            "Total number of requests that joined an in-flight upstream fetch."
        );
        describe_counter!(
            METRIC_ANALYSIS_HIT,
            Unit::Count,
            "Total number of analyses served from the analysis cache."
        );
        describe_counter!(
            METRIC_ANALYSIS_MISS,
            Unit::Count,
            "Total number of analysis-cache misses."
        );
        describe_counter!(
            METRIC_ANALYSIS_COALESCED,
            Unit::Count,
            "Total number of requests that joined an in-flight analysis."
        );
        describe_counter!(
            METRIC_STORAGE_ERROR,
            Unit::Count,
            "Total number of cache storage reads or writes that failed."
        );
        describe_histogram!(
            METRIC_UPSTREAM_MS,
            Unit::Milliseconds,
            "Upstream GraphQL request latency in milliseconds."
        );
    });
}
