//! The built application.
//!
//! # Responsibilities
//! - Seed each request with its own copy of the server value store
//! - Run the composed middleware chain and router
//! - Plug into axum as a fallback service, wrapped in the tower-http layers
//!   (request id, trace, timeout)

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request as HttpRequest;
use axum::response::Response;
use axum::Router;
use futures_util::future::{BoxFuture, FutureExt};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::values::Values;
use crate::config::HttpConfig;
use crate::dispatch::Handler;
use crate::observability::tracing::{RequestUuid, X_REQUEST_ID};

struct AppInner {
    entry: Handler,
    values: Values,
    patterns: Vec<String>,
}

/// An immutable, cloneable application: a `tower::Service` over
/// `http::Request<Body>`.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub(crate) fn new(entry: Handler, values: Values, patterns: Vec<String>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                entry,
                values,
                patterns,
            }),
        }
    }

    /// Handle one request.
    pub fn dispatch(&self, mut req: HttpRequest<Body>) -> BoxFuture<'static, Response> {
        req.extensions_mut().insert(self.inner.values.clone());
        self.inner.entry.call(req)
    }

    /// The server-wide values every request starts from.
    pub fn values(&self) -> &Values {
        &self.inner.values
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> &[String] {
        &self.inner.patterns
    }

    /// An axum router serving this app for every path, behind the
    /// request id, trace and timeout layers.
    #[allow(deprecated)]
    pub fn into_router(self, config: &HttpConfig) -> Router {
        Router::new()
            .fallback_service(self)
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, RequestUuid))
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("patterns", &self.inner.patterns)
            .field("values", &self.inner.values)
            .finish()
    }
}

impl tower::Service<HttpRequest<Body>> for App {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HttpRequest<Body>) -> Self::Future {
        self.dispatch(req).map(Ok).boxed()
    }
}
