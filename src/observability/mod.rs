//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem produces:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and histograms)
//!     → tracing.rs (request ids on every request and response)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields over formatted strings
//! - Metric calls are no-ops until an exporter is installed
//! - Request id generated at the edge and echoed back

pub mod logging;
pub mod metrics;
pub mod tracing;
