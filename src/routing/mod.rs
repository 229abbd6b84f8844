//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     "[METHOD ]/path"
//!     → matcher.rs (parse and validate into a Pattern)
//!     → router.rs (insert into the ordered Mux table)
//!
//! Request:
//!     method + path
//!     → router.rs (scan, keep the most specific match)
//!     → Endpoint handler, or 404 / 405
//! ```
//!
//! # Design Decisions
//! - Table frozen at build time, immutable while serving
//! - No regex (exact and subtree prefix matching only)
//! - Deterministic: most specific pattern wins regardless of order

pub mod matcher;
pub mod router;

pub use matcher::{Pattern, PatternError};
pub use router::{Mux, Route};
