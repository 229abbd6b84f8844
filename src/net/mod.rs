//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! "unix!/path" | "tcp!host:port" | "/path" | "host:port" | ":port"
//!     → address.rs (parse into ListenAddr)
//!     → listener.rs (bind all or nothing)
//!     → axum::serve per listener, task-per-connection
//!     → App (via the axum Router)
//! ```
//!
//! # Design Decisions
//! - Every address is bound before any is served
//! - A failed bind releases everything bound so far
//! - Shutdown is shared: one failing listener stops them all

pub mod address;
pub mod listener;

pub use address::{ListenAddr, TcpFamily};
pub use listener::{ListenerError, Listeners, LocalAddr};
