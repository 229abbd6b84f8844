//! The pattern table.
//!
//! # Responsibilities
//! - Store endpoints under their patterns in registration order
//! - Find the most specific pattern for a request
//! - Answer 404 / 405 when nothing fits
//!
//! # Design Decisions
//! - Registering an existing pattern replaces its endpoint in place
//! - Frozen into a single `Handler` before serving; no locks at runtime
//! - Linear scan (route tables are small)

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request as HttpRequest, StatusCode};
use axum::response::IntoResponse;

use super::matcher::Pattern;
use crate::dispatch::{Endpoint, Handler};
use crate::http::error::ApiError;
use crate::observability::metrics;

/// A pattern and the endpoint registered under it.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: Pattern,
    pub endpoint: Endpoint,
}

/// Ordered pattern → endpoint table.
#[derive(Debug, Default)]
pub struct Mux {
    routes: Vec<Route>,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `endpoint` under `pattern`. A previous registration of the same
    /// pattern is replaced.
    pub fn insert(&mut self, pattern: Pattern, endpoint: Endpoint) {
        if let Some(route) = self.routes.iter_mut().find(|r| r.pattern == pattern) {
            tracing::warn!(pattern = %pattern, "pattern registered twice, replacing previous handler");
            route.endpoint = endpoint;
            return;
        }
        tracing::debug!(pattern = %pattern, shape = %endpoint.shape(), "handler registered");
        self.routes.push(Route { pattern, endpoint });
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table into the final handler of the middleware chain.
    pub fn into_handler(self) -> Handler {
        let routes: Arc<[Route]> = self.routes.into();
        Handler::new(move |req: HttpRequest<Body>| {
            let routes = Arc::clone(&routes);
            async move { dispatch(&routes, req).await }
        })
    }
}

enum Lookup<'a> {
    Found(&'a Route),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

fn lookup<'a>(routes: &'a [Route], method: &Method, path: &str) -> Lookup<'a> {
    let mut best: Option<(usize, &Route)> = None;
    let mut allowed = Vec::new();

    for route in routes {
        let Some(specificity) = route.pattern.match_path(path) else {
            continue;
        };
        if !route.pattern.allows(method) {
            allowed.extend(route.pattern.method().cloned());
            continue;
        }
        if best.is_none_or(|(s, _)| specificity > s) {
            best = Some((specificity, route));
        }
    }

    match best {
        Some((_, route)) => Lookup::Found(route),
        None if !allowed.is_empty() => Lookup::MethodNotAllowed(allowed),
        None => Lookup::NotFound,
    }
}

async fn dispatch(routes: &[Route], req: HttpRequest<Body>) -> axum::response::Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let (label, response) = match lookup(routes, &method, &path) {
        Lookup::Found(route) => {
            tracing::debug!(pattern = %route.pattern, %method, %path, "calling handler");
            let response = route.endpoint.handler().call(req).await;
            (route.pattern.to_string(), response)
        }
        Lookup::MethodNotAllowed(allowed) => {
            let mut response =
                ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            ("none".to_owned(), response)
        }
        Lookup::NotFound => {
            tracing::debug!(%method, %path, "no pattern matched");
            ("none".to_owned(), ApiError::not_found().into_response())
        }
    };

    metrics::record_request(method.as_str(), &label, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::shape::HandlerShape;

    fn tagged(tag: &'static str) -> Endpoint {
        Endpoint::new(HandlerShape::Raw, Handler::new(move |_req| async move { tag }))
    }

    fn table(patterns: &[(&str, &'static str)]) -> Mux {
        let mut mux = Mux::new();
        for (pattern, tag) in patterns {
            mux.insert(Pattern::parse(pattern).unwrap(), tagged(tag));
        }
        mux
    }

    async fn get(handler: &Handler, method: Method, uri: &str) -> (StatusCode, String) {
        let req = HttpRequest::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = handler.call(req).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn most_specific_pattern_wins() {
        let handler = table(&[
            ("/", "root"),
            ("/api/", "api"),
            ("/api/items", "items"),
            ("POST /api/items", "create"),
        ])
        .into_handler();

        assert_eq!(get(&handler, Method::GET, "/api/items").await.1, "items");
        assert_eq!(get(&handler, Method::POST, "/api/items").await.1, "create");
        assert_eq!(get(&handler, Method::GET, "/api/other").await.1, "api");
        assert_eq!(get(&handler, Method::GET, "/favicon.ico").await.1, "root");
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found() {
        let handler = table(&[("/api/items", "items")]).into_handler();
        let (status, body) = get(&handler, Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "{\"error\":\"not found\"}\n");
    }

    #[tokio::test]
    async fn wrong_method_lists_allowed_methods() {
        let handler = table(&[("GET /items", "list"), ("POST /items", "create")]).into_handler();
        let req = HttpRequest::delete("/items").body(Body::empty()).unwrap();
        let response = handler.call(req).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn duplicate_pattern_replaces_in_place() {
        let mux = table(&[("/a", "first"), ("/b", "b"), ("/a", "second")]);
        let patterns: Vec<String> = mux.routes().iter().map(|r| r.pattern.to_string()).collect();
        assert_eq!(patterns, vec!["/a", "/b"]);

        let handler = mux.into_handler();
        assert_eq!(get(&handler, Method::GET, "/a").await.1, "second");
    }
}
