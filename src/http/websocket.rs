//! WebSocket upgrade endpoints.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Complete the upgrade handshake and hand the socket to the callback
//! - Route plain requests to an optional fallback handler
//!
//! # Data Flow
//! ```text
//! Upgrade: websocket → handshake → on_connect(Request, WebSocket)
//! anything else      → fallback endpoint, or 400
//! ```
//!
//! # Design Decisions
//! - Upgrade requests bypass body decoding and response encoding entirely
//! - The `Request` view (with its value store) is built before the handshake
//!   so middleware and permission mutations reach the callback

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::{header, HeaderMap, Request as HttpRequest};
use axum::response::IntoResponse;

pub use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};

use crate::dispatch::shape::{marker, HandlerShape, IntoEndpoint};
use crate::dispatch::{DispatchConfig, Endpoint, Handler};
use crate::http::error::ApiError;
use crate::http::request::Request;

type MakeEndpoint = Box<dyn FnOnce(&DispatchConfig) -> Endpoint + Send + Sync>;

/// A websocket endpoint under construction. See [`upgrade`].
pub struct Upgrade<F> {
    on_connect: F,
    fallback: Option<MakeEndpoint>,
}

/// Serve websocket connections with `on_connect`.
///
/// ```ignore
/// server.handle("/ws", websocket::upgrade(|_req, mut socket| async move {
///     while let Some(Ok(msg)) = socket.recv().await {
///         if socket.send(msg).await.is_err() {
///             break;
///         }
///     }
/// }));
/// ```
pub fn upgrade<F, Fut>(on_connect: F) -> Upgrade<F>
where
    F: Fn(Request, WebSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Upgrade {
        on_connect,
        fallback: None,
    }
}

impl<F> Upgrade<F> {
    /// Handle requests that do not ask for an upgrade with `handler`, which
    /// may be of any shape accepted by `Server::handle`.
    pub fn fallback<M, H>(mut self, handler: H) -> Self
    where
        H: IntoEndpoint<M>,
    {
        self.fallback = Some(Box::new(move |config: &DispatchConfig| {
            handler.into_endpoint(config)
        }));
        self
    }
}

/// Whether the request asks for a websocket upgrade.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

impl<F, Fut> IntoEndpoint<marker::Upgrade> for Upgrade<F>
where
    F: Fn(Request, WebSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_endpoint(self, config: &DispatchConfig) -> Endpoint {
        let fallback = self.fallback.map(|make| make(config));
        let shape = HandlerShape::Upgrade {
            fallback: fallback.as_ref().map(|ep| Box::new(ep.shape().clone())),
        };
        let fallback = fallback.map(|ep| ep.handler().clone());
        let on_connect = Arc::new(self.on_connect);

        let handler = Handler::new(move |req: HttpRequest<Body>| {
            let on_connect = Arc::clone(&on_connect);
            let fallback = fallback.clone();
            async move {
                if !is_upgrade_request(req.headers()) {
                    return match fallback {
                        Some(handler) => handler.call(req).await,
                        None => ApiError::bad_request("websocket upgrade required").into_response(),
                    };
                }

                let (mut parts, _body) = req.into_parts();
                let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                    Ok(ws) => ws,
                    Err(rejection) => {
                        tracing::debug!(%rejection, "websocket handshake rejected");
                        return rejection.into_response();
                    }
                };
                let request = Request::from_parts(parts);
                tracing::debug!(path = request.path(), "websocket upgraded");
                ws.on_upgrade(move |socket| on_connect(request, socket))
            }
        });

        Endpoint::new(shape, handler)
    }
}
