//! Response encoding.
//!
//! # Responsibilities
//! - Encode handler outputs (`Reply`)
//! - Build the `{"info": ...}` / `{"error": ...}` message envelopes
//! - Fall back to an error body when JSON encoding fails
//!
//! # Design Decisions
//! - Byte outputs are written verbatim without a content type
//! - Strings become `info` messages, never raw text
//! - Bodies end with a newline, like a streaming JSON encoder would emit

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Conversion of a handler output into a response.
pub trait Reply {
    fn into_reply(self) -> Response;
}

/// Encode any reply. Handy inside raw handlers.
pub fn output<R: Reply>(reply: R) -> Response {
    reply.into_reply()
}

/// A `{"<label>": "<msg>"}` message.
pub fn message(status: StatusCode, label: &str, msg: &str) -> Response {
    let mut map = serde_json::Map::with_capacity(1);
    map.insert(label.to_owned(), serde_json::Value::String(msg.to_owned()));
    json(status, &map)
}

/// A 200 `{"info": "<msg>"}` message.
pub fn info(msg: &str) -> Response {
    message(StatusCode::OK, "info", msg)
}

/// JSON-encode `value` with `status`.
///
/// If encoding fails the status is kept and the body carries the encoder's
/// error instead.
pub fn json<T>(status: StatusCode, value: &T) -> Response
where
    T: Serialize + ?Sized,
{
    let mut body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            let fallback = serde_json::json!({ "error": e.to_string() });
            serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{\"error\":\"encoding failed\"}".to_vec())
        }
    };
    body.push(b'\n');

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    response
}

fn raw(bytes: Bytes) -> Response {
    Response::new(Body::from(bytes))
}

impl Reply for String {
    fn into_reply(self) -> Response {
        info(&self)
    }
}

impl Reply for &'static str {
    fn into_reply(self) -> Response {
        info(self)
    }
}

impl Reply for Vec<u8> {
    fn into_reply(self) -> Response {
        raw(Bytes::from(self))
    }
}

impl Reply for Bytes {
    fn into_reply(self) -> Response {
        raw(self)
    }
}

impl<T: Serialize> Reply for Json<T> {
    fn into_reply(self) -> Response {
        json(StatusCode::OK, &self.0)
    }
}

impl Reply for serde_json::Value {
    fn into_reply(self) -> Response {
        json(StatusCode::OK, &self)
    }
}

impl Reply for () {
    fn into_reply(self) -> Response {
        json(StatusCode::OK, &())
    }
}

impl Reply for Response {
    fn into_reply(self) -> Response {
        self
    }
}

/// An output that declares its own status.
#[derive(Debug, Clone)]
pub struct WithStatus<T>(pub StatusCode, pub T);

impl<T: Reply> Reply for WithStatus<T> {
    fn into_reply(self) -> Response {
        let mut response = self.1.into_reply();
        *response.status_mut() = self.0;
        response
    }
}

impl<T: Reply> IntoResponse for WithStatus<T> {
    fn into_response(self) -> Response {
        self.into_reply()
    }
}
