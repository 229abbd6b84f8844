//! Middleware chain.
//!
//! A middleware takes the next stage's handler and returns a replacement.
//! The chain is folded around the router once, when the server is built:
//! for registration order `[A, B, C]` a request passes through C, then B,
//! then A, then reaches the router.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request as HttpRequest;
use axum::response::{IntoResponse, Response};

use crate::dispatch::Handler;

/// A wrapping function over the next stage.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wrap a plain `Fn(Handler) -> Handler` as a `Middleware`.
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The rest of the chain, as seen from inside a `from_fn` middleware.
#[derive(Debug, Clone)]
pub struct Next {
    inner: Handler,
}

impl Next {
    pub async fn run(self, req: HttpRequest<Body>) -> Response {
        self.inner.call(req).await
    }
}

/// Build a middleware from an async function of the request and the rest of
/// the chain.
///
/// ```ignore
/// server.use_middleware(middleware::from_fn(|mut req, next: Next| async move {
///     req.values_mut().set("user", "anonymous");
///     next.run(req).await
/// }));
/// ```
pub fn from_fn<F, Fut, R>(f: F) -> Middleware
where
    F: Fn(HttpRequest<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    let f = Arc::new(f);
    Arc::new(move |inner: Handler| {
        let f = Arc::clone(&f);
        Handler::new(move |req| {
            let next = Next {
                inner: inner.clone(),
            };
            f(req, next)
        })
    })
}

/// Fold `middleware` around `router`; the last registered ends up outermost.
pub fn build_chain(middleware: &[Middleware], router: Handler) -> Handler {
    middleware.iter().fold(router, |next, wrap| wrap(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Middleware {
        from_fn(move |req, next: Next| {
            log.lock().unwrap().push(name);
            next.run(req)
        })
    }

    #[tokio::test]
    async fn last_registered_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router_log = Arc::clone(&log);
        let router = Handler::new(move |_req| {
            router_log.lock().unwrap().push("router");
            async { "done" }
        });

        let chain = build_chain(
            &[
                recording("A", Arc::clone(&log)),
                recording("B", Arc::clone(&log)),
                recording("C", Arc::clone(&log)),
            ],
            router,
        );
        chain
            .call(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["C", "B", "A", "router"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let router = Handler::new(|_req| async { "router" });
        let deny = middleware(|_next: Handler| {
            Handler::new(|_req| async { (axum::http::StatusCode::UNAUTHORIZED, "no") })
        });

        let response = build_chain(&[deny], router)
            .call(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
