//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every signal() future resolves → listeners drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger()
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config, logging, routes, bind, serve
//! - Ordered shutdown: stop accepting, drain in-flight requests, close

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
