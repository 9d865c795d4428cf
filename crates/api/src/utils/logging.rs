//! Tracing setup and request outcome logging

use std::time::Duration;

use axum::http::StatusCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` drives filtering (default `info`). `USERHUB_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("USERHUB_LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = if json { builder.json().try_init() } else { builder.try_init() };
}

/// Log the outcome of one handled request with structured fields.
///
/// `route` must be a static route pattern, never the raw path.
#[inline]
pub fn log_request_outcome(route: &'static str, status: StatusCode, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;
    let status = status.as_u16();

    if status >= 500 {
        warn!(route, status, duration_ms, "request_failed");
    } else {
        info!(route, status, duration_ms, "request_completed");
    }
}
