//! Handler adaptation and dispatch.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     callable
//!     → shape.rs (static classification into a HandlerShape)
//!     → adapter.rs (uniform Handler closure: decode, invoke, encode)
//!     → permission.rs (optional OR-gate of predicates)
//!     → Endpoint installed in the pattern table
//!
//! Request:
//!     http::Request<Body> → Handler → Response
//! ```
//!
//! # Design Decisions
//! - Every type decision happens once, at registration; the hot path only
//!   calls the captured closure
//! - Unsupported callable shapes do not satisfy `IntoEndpoint` and fail to
//!   compile

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request as HttpRequest;
use axum::response::{IntoResponse, Response};
use futures_util::future::{BoxFuture, FutureExt};

pub mod adapter;
pub mod permission;
pub mod shape;

pub use adapter::RawService;
pub use permission::{permission, Permission};
pub use shape::{HandlerShape, IntoEndpoint};

/// Default cap on decoded request bodies (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A uniform request handler: transport request in, response out.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<dyn Fn(HttpRequest<Body>) -> BoxFuture<'static, Response> + Send + Sync>,
}

impl Handler {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(HttpRequest<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self {
            inner: Arc::new(move |req: HttpRequest<Body>| {
                let fut = f(req);
                async move { fut.await.into_response() }.boxed()
            }),
        }
    }

    pub fn call(&self, req: HttpRequest<Body>) -> BoxFuture<'static, Response> {
        (self.inner)(req)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Settings captured by adapters at registration time.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Largest request body a decoding handler will read.
    pub body_limit: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// A registered handler and the shape it was classified as.
#[derive(Debug, Clone)]
pub struct Endpoint {
    shape: HandlerShape,
    handler: Handler,
}

impl Endpoint {
    pub fn new(shape: HandlerShape, handler: Handler) -> Self {
        Self { shape, handler }
    }

    pub fn shape(&self) -> &HandlerShape {
        &self.shape
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Gate the handler behind `permissions`. The shape is unchanged.
    pub fn guarded(self, permissions: Vec<Permission>) -> Self {
        Self {
            shape: self.shape,
            handler: permission::gate(self.handler, permissions),
        }
    }
}
