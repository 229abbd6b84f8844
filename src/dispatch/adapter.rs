//! Dispatch adapters: one `IntoEndpoint` impl per handler shape.
//!
//! # Responsibilities
//! - Pass transport-level handlers through untouched
//! - Build the `Request` view for typed handlers
//! - Read and strictly decode the body for decoding handlers
//! - Encode the output or the error of typed handlers

use std::any::type_name;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::http::Request as HttpRequest;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use super::shape::{marker, HandlerShape, IntoEndpoint};
use super::{DispatchConfig, Endpoint, Handler};
use crate::http::codec;
use crate::http::error::ApiError;
use crate::http::request::Request;
use crate::http::response::Reply;
use crate::observability::metrics;

/// Registers a `tower::Service` as a transport-level handler.
#[derive(Debug, Clone)]
pub struct RawService<S>(pub S);

impl<S> IntoEndpoint<marker::Service> for RawService<S>
where
    S: tower::Service<HttpRequest<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    fn into_endpoint(self, _config: &DispatchConfig) -> Endpoint {
        let service = self.0;
        let handler = Handler::new(move |req| {
            let service = service.clone();
            async move {
                match service.oneshot(req).await {
                    Ok(response) => response.into_response(),
                    Err(never) => match never {},
                }
            }
        });
        Endpoint::new(
            HandlerShape::Service {
                service: type_name::<S>(),
            },
            handler,
        )
    }
}

impl<F, Fut, R> IntoEndpoint<marker::Raw> for F
where
    F: Fn(HttpRequest<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn into_endpoint(self, _config: &DispatchConfig) -> Endpoint {
        Endpoint::new(HandlerShape::Raw, Handler::new(self))
    }
}

impl<F, Fut, O, E> IntoEndpoint<marker::Unary> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Reply + 'static,
    E: Into<ApiError> + 'static,
{
    fn into_endpoint(self, _config: &DispatchConfig) -> Endpoint {
        let handler = Handler::new(move |req| {
            let (req, _body) = Request::from_http(req);
            let fut = self(req);
            async move { encode(fut.await) }
        });
        Endpoint::new(
            HandlerShape::Unary {
                output: type_name::<O>(),
            },
            handler,
        )
    }
}

impl<F, Fut, I, O, E> IntoEndpoint<marker::Decoded<I>> for F
where
    F: Fn(Request, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Reply + 'static,
    E: Into<ApiError> + 'static,
{
    fn into_endpoint(self, config: &DispatchConfig) -> Endpoint {
        let f = Arc::new(self);
        let limit = config.body_limit;
        let handler = Handler::new(move |req| {
            let f = Arc::clone(&f);
            async move {
                let (req, body) = Request::from_http(req);
                let input = match decode_body::<I>(body, limit).await {
                    Ok(input) => input,
                    Err(e) => {
                        metrics::record_decode_failure();
                        return e.into_response();
                    }
                };
                encode(f(req, input).await)
            }
        });
        Endpoint::new(
            HandlerShape::Decoded {
                input: type_name::<I>(),
                output: type_name::<O>(),
            },
            handler,
        )
    }
}

async fn decode_body<I: DeserializeOwned>(body: Body, limit: usize) -> Result<I, ApiError> {
    if body.size_hint().exact() == Some(0) {
        return Err(ApiError::bad_request("no body supplied"));
    }
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ApiError::bad_request(format!("parsing body: {e}")))?;
    codec::from_slice_strict(&bytes).map_err(|e| ApiError::bad_request(format!("parsing body: {e}")))
}

fn encode<O: Reply, E: Into<ApiError>>(result: Result<O, E>) -> Response {
    match result {
        Ok(output) => output.into_reply(),
        Err(e) => e.into().into_response(),
    }
}
