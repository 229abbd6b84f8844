//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, latency, denials, decode failures)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, pattern, status
//! - `api_request_duration_seconds` (histogram): latency by method, pattern
//! - `api_permission_denied_total` (counter): requests no predicate approved
//! - `api_decode_failures_total` (counter): bodies rejected before invocation
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the recorder
//! - `pattern` label is the registered pattern, never the raw path, so label
//!   cardinality is bounded by the route table

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "api_requests_total";
pub const REQUEST_DURATION: &str = "api_request_duration_seconds";
pub const PERMISSION_DENIED_TOTAL: &str = "api_permission_denied_total";
pub const DECODE_FAILURES_TOTAL: &str = "api_decode_failures_total";

/// Install the global recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "metrics exporter listening");
    Ok(())
}

fn describe() {
    metrics::describe_counter!(REQUESTS_TOTAL, "Requests dispatched, by method, pattern and status");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Time spent dispatching a request"
    );
    metrics::describe_counter!(PERMISSION_DENIED_TOTAL, "Requests rejected by permission predicates");
    metrics::describe_counter!(DECODE_FAILURES_TOTAL, "Request bodies that failed to decode");
}

/// Record one dispatched request.
pub fn record_request(method: &str, pattern: &str, status: u16, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_owned(),
        "pattern" => pattern.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_owned(),
        "pattern" => pattern.to_owned()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_permission_denied() {
    metrics::counter!(PERMISSION_DENIED_TOTAL).increment(1);
}

pub fn record_decode_failure() {
    metrics::counter!(DECODE_FAILURES_TOTAL).increment(1);
}
