//! HTTP boundary of the dispatch engine.
//!
//! # Data Flow
//! ```text
//! http::Request<Body>
//!     → request.rs (Request view: parts + value store)
//!     → codec.rs (strict JSON body decoding)
//!     → [handler]
//!     → response.rs (Reply encoding, {"info"} / {"error"} envelopes)
//!     → error.rs (ApiError status classification)
//!
//! Upgrade: websocket
//!     → websocket.rs (handshake, on_connect callback)
//! ```

pub mod codec;
pub mod error;
pub mod request;
pub mod response;
pub mod websocket;

pub use error::{ApiError, HttpStatus, NotFound, StatusError, PERMISSION_DENIED};
pub use request::Request;
pub use response::{Reply, WithStatus};
