//! Permission gating.
//!
//! A gated handler runs only if at least one predicate approves the request.
//! Predicates run in registration order and evaluation stops at the first
//! approval. Mutations a predicate makes to the request's value store are
//! visible to later predicates and to the handler.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request as HttpRequest;
use axum::response::IntoResponse;

use super::Handler;
use crate::http::error::ApiError;
use crate::http::request::Request;
use crate::observability::metrics;

/// A predicate over the request.
pub type Permission = Arc<dyn Fn(&mut Request) -> bool + Send + Sync>;

/// Box a closure as a `Permission`.
pub fn permission<F>(f: F) -> Permission
where
    F: Fn(&mut Request) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` so it only runs when a predicate approves.
///
/// With no predicates the handler is returned as is. Otherwise a request that
/// no predicate approves gets 403 `permission denied`.
pub fn gate(handler: Handler, permissions: Vec<Permission>) -> Handler {
    if permissions.is_empty() {
        return handler;
    }
    let permissions: Arc<[Permission]> = permissions.into();
    Handler::new(move |req: HttpRequest<Body>| {
        let (mut view, body) = Request::from_http(req);
        let allowed = permissions.iter().any(|allows| allows(&mut view));
        let handler = handler.clone();
        async move {
            if !allowed {
                tracing::debug!(path = view.path(), "permission denied");
                metrics::record_permission_denied();
                return ApiError::permission_denied().into_response();
            }
            handler.call(view.into_http(body)).await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::StatusCode;
    use axum::response::Response;

    use crate::server::values::ValuesExt;

    fn counting_handler(calls: Arc<AtomicUsize>) -> Handler {
        Handler::new(move |req: HttpRequest<Body>| {
            calls.fetch_add(1, Ordering::SeqCst);
            let role = req
                .values()
                .and_then(|v| v.get::<&str>("role"))
                .copied()
                .unwrap_or("none");
            async move { role.to_owned() }
        })
    }

    fn fixed(result: bool, evaluated: Arc<AtomicUsize>) -> Permission {
        permission(move |_req| {
            evaluated.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    async fn run(handler: &Handler) -> Response {
        handler
            .call(HttpRequest::get("/admin").body(Body::empty()).unwrap())
            .await
    }

    #[tokio::test]
    async fn no_predicates_means_no_gate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = gate(counting_handler(Arc::clone(&calls)), Vec::new());

        assert_eq!(run(&handler).await.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn any_approval_runs_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluated = Arc::new(AtomicUsize::new(0));
        let handler = gate(
            counting_handler(Arc::clone(&calls)),
            vec![
                fixed(false, Arc::clone(&evaluated)),
                fixed(true, Arc::clone(&evaluated)),
                fixed(true, Arc::clone(&evaluated)),
            ],
        );

        assert_eq!(run(&handler).await.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // the third predicate is never consulted
        assert_eq!(evaluated.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_denials_block_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluated = Arc::new(AtomicUsize::new(0));
        let handler = gate(
            counting_handler(Arc::clone(&calls)),
            vec![
                fixed(false, Arc::clone(&evaluated)),
                fixed(false, Arc::clone(&evaluated)),
            ],
        );

        let response = run(&handler).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\"error\":\"permission denied\"}\n");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(evaluated.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn predicate_mutations_reach_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = gate(
            counting_handler(Arc::clone(&calls)),
            vec![permission(|req| {
                req.set("role", "admin");
                true
            })],
        );

        let response = run(&handler).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"admin");
    }
}
