//! The request view handed to typed handlers and permission predicates.
//!
//! # Responsibilities
//! - Expose method, URI, headers and query parameters of a transport request
//! - Carry the request-scoped value store
//! - Convert back into a transport request for raw handlers
//!
//! # Design Decisions
//! - The body is split off before the view is built; typed handlers never
//!   read it themselves
//! - The value store travels in the transport request's extensions between
//!   middleware stages and is taken out while a `Request` owns it

use std::any::Any;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Method, Request as HttpRequest, Uri};

use crate::server::values::Values;

/// A transport request without its body, plus its value store.
#[derive(Debug)]
pub struct Request {
    parts: Parts,
    values: Values,
}

impl Request {
    /// Build from request parts, taking the value store out of the
    /// extensions (an empty store when none was seeded).
    pub fn from_parts(mut parts: Parts) -> Self {
        let values = parts.extensions.remove::<Values>().unwrap_or_default();
        Self { parts, values }
    }

    pub(crate) fn from_http(req: HttpRequest<Body>) -> (Self, Body) {
        let (parts, body) = req.into_parts();
        (Self::from_parts(parts), body)
    }

    /// Reassemble a transport request, putting the value store back into the
    /// extensions.
    pub fn into_http(self, body: Body) -> HttpRequest<Body> {
        let Self { mut parts, values } = self;
        parts.extensions.insert(values);
        HttpRequest::from_parts(parts, body)
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a URL-decoded query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Assign a value visible for the rest of this request only.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values.set(key, value);
    }

    /// Look up a value seeded by the server or set earlier in this request.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::values::ValuesExt;

    fn request(uri: &str) -> Request {
        let (parts, _) = HttpRequest::builder()
            .uri(uri)
            .header("x-user", "ana")
            .body(())
            .unwrap()
            .into_parts();
        Request::from_parts(parts)
    }

    #[test]
    fn query_parameters_are_decoded() {
        let req = request("/search?q=hello%20world&page=2&q=second");
        assert_eq!(req.query("q").as_deref(), Some("hello world"));
        assert_eq!(req.query("page").as_deref(), Some("2"));
        assert_eq!(req.query("missing"), None);
        assert_eq!(req.path(), "/search");
        assert_eq!(req.header("x-user"), Some("ana"));
    }

    #[test]
    fn values_round_trip_through_transport_request() {
        let mut req = request("/");
        req.set("tenant", String::from("acme"));

        let http = req.into_http(Body::empty());
        assert_eq!(
            http.values().and_then(|v| v.get::<String>("tenant")).map(String::as_str),
            Some("acme")
        );

        let (req, _) = Request::from_http(http);
        assert_eq!(req.get::<String>("tenant").map(String::as_str), Some("acme"));
        assert!(req.extensions().get::<Values>().is_none());
    }
}
