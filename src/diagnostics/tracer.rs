/*!
 * Diagnostic Tracing
 * tracing-subscriber setup for trace2's own diagnostics
 *
 * Environment variables:
 * - RUST_LOG: log filter (default: warn)
 * - TRACE2_LOG_JSON: JSON output when `1` or `true`
 */

use crate::core::limits::LOG_JSON_ENV;
use tracing::{debug, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Whether a `TRACE2_LOG_JSON` value asks for JSON output
pub fn json_requested(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// Install the global subscriber, writing to stderr
///
/// Does nothing if a subscriber is already installed, so embedding
/// programs keep their own.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let use_json = json_requested(std::env::var(LOG_JSON_ENV).ok().as_deref());

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        debug!(json = use_json, "trace2 diagnostics initialized");
    }
}

/// Span covering one harness unit
pub fn unit_span(unit: &str) -> Span {
    span!(Level::DEBUG, "unit", name = unit)
}
