//! HTTP client for APIs served by this crate (or any JSON API).
//!
//! # Responsibilities
//! - Join the endpoint and request path without losing query strings
//! - Attach the token as a header or a query parameter
//! - Encode request bodies, decode JSON responses (optionally strictly)
//! - Turn `{"error": ...}` responses into `ClientError::Status`
//! - Talk over TCP or a unix socket, plain HTTP or websocket
//!
//! # Design Decisions
//! - Builder methods consume and return the client; clone to derive variants
//! - Empty strings mean "not set", so values read from files or flags can be
//!   passed through unchanged

use std::fmt;
use std::path::PathBuf;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::http::codec::{self, DecodeError};

pub mod settings;
mod transport;

pub use transport::WsConnection;

pub const DEFAULT_HEADER_TOKEN: &str = "Authorization";
pub const DEFAULT_TOKEN_PREFIX: &str = "Bearer";
pub const DEFAULT_WEBSOCKET_ORIGIN: &str = "http://localhost/";

/// Errors returned by `Client`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },

    #[error("encoding request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("api: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api: connecting to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("api: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("api: building request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("api: reading response: {0}")]
    Body(String),

    #[error("{status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("decoding response: {0}")]
    Decode(#[from] DecodeError),

    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("unsupported url scheme `{0}`")]
    Scheme(String),
}

impl ClientError {
    /// The HTTP status, for errors reported by the server.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A request body.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body at all.
    #[default]
    None,
    /// Bytes sent as is.
    Raw(Bytes),
    /// JSON, sent with `Content-Type: application/json`.
    Json(Bytes),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
        serde_json::to_vec(value)
            .map(|b| Payload::Json(b.into()))
            .map_err(ClientError::Encode)
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Payload::Raw(bytes.into())
    }
}

/// A response as received, whatever its status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Media type of the body, lowercased, without parameters.
    pub fn content_type(&self) -> Option<String> {
        let value = self.headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let media = value.split(';').next().unwrap_or(value);
        Some(media.trim().to_ascii_lowercase())
    }

    /// `Err(ClientError::Status)` for statuses of 400 and above.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.status.as_u16() < 400 {
            return Ok(self);
        }
        Err(ClientError::Status {
            status: self.status,
            message: error_message(&self.body),
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorEnvelope {
    error: String,
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error)
}

/// A configured API client.
#[derive(Clone)]
pub struct Client {
    endpoint: String,
    token: Option<String>,
    header_token: Option<String>,
    token_prefix: Option<String>,
    param_token: Option<String>,
    disallow_unknown_fields: bool,
    unix_socket: Option<PathBuf>,
    websocket_origin: Option<String>,
    user_agent: Option<String>,
    http: reqwest::Client,
}

fn non_empty(s: impl Into<String>) -> Option<String> {
    Some(s.into()).filter(|s| !s.is_empty())
}

impl Client {
    /// A client for the API rooted at `endpoint` (e.g. `https://host/api/v4`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            header_token: None,
            token_prefix: None,
            param_token: None,
            disallow_unknown_fields: false,
            unix_socket: None,
            websocket_origin: None,
            user_agent: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(token);
        self
    }

    /// Header carrying the token (default `Authorization`).
    pub fn with_header_token(mut self, header: impl Into<String>) -> Self {
        self.header_token = non_empty(header);
        self
    }

    /// Word sent before the token in the header (default `Bearer` when the
    /// header is defaulted too).
    pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = non_empty(prefix);
        self
    }

    /// Send the token as this query parameter instead of a header.
    pub fn with_param_token(mut self, param: impl Into<String>) -> Self {
        self.param_token = non_empty(param);
        self
    }

    /// Reject response objects with keys the target type does not declare.
    pub fn disallow_unknown_fields(mut self) -> Self {
        self.disallow_unknown_fields = true;
        self
    }

    /// Connect through this unix socket instead of the network.
    pub fn with_unix_socket(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.unix_socket = Some(path).filter(|p| !p.as_os_str().is_empty());
        self
    }

    /// `Origin` header for websocket connections.
    pub fn with_websocket_origin(mut self, origin: impl Into<String>) -> Self {
        self.websocket_origin = non_empty(origin);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = non_empty(user_agent);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The full URL and the headers for a request to `path`.
    pub fn url_and_headers(&self, path: &str) -> Result<(Url, HeaderMap), ClientError> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.endpoint.strip_suffix('/').unwrap_or(&self.endpoint),
            path.strip_prefix('/').unwrap_or(path)
        ))?;

        let mut headers = HeaderMap::new();
        if let Some(user_agent) = &self.user_agent {
            insert_header(&mut headers, header::USER_AGENT.as_str(), user_agent)?;
        }

        let Some(token) = &self.token else {
            return Ok((url, headers));
        };

        if let Some(param) = &self.param_token {
            url.query_pairs_mut().append_pair(param, token);
        }

        let (header_name, prefix) = match (&self.header_token, &self.param_token) {
            (Some(name), _) => (Some(name.as_str()), self.token_prefix.as_deref()),
            (None, None) => (
                Some(DEFAULT_HEADER_TOKEN),
                Some(self.token_prefix.as_deref().unwrap_or(DEFAULT_TOKEN_PREFIX)),
            ),
            (None, Some(_)) => (None, None),
        };
        if let Some(name) = header_name {
            let value = match prefix {
                Some(prefix) => format!("{prefix} {token}"),
                None => token.clone(),
            };
            insert_header(&mut headers, name, &value)?;
        }

        Ok((url, headers))
    }

    /// Send a request and return the response whatever its status.
    pub async fn send(&self, method: Method, path: &str, payload: Payload) -> Result<RawResponse, ClientError> {
        let (url, mut headers) = self.url_and_headers(path)?;
        let body = match payload {
            Payload::None => None,
            Payload::Raw(bytes) => Some(bytes),
            Payload::Json(bytes) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(bytes)
            }
        };
        tracing::debug!(%method, %url, "api request");

        match &self.unix_socket {
            Some(socket) => transport::send_unix(socket, method, &url, headers, body).await,
            None => transport::send_tcp(&self.http, method, url, headers, body).await,
        }
    }

    /// Send a request and return the body of a successful response.
    pub async fn request_raw(&self, method: Method, path: &str, payload: Payload) -> Result<Bytes, ClientError> {
        Ok(self.send(method, path, payload).await?.error_for_status()?.body)
    }

    /// Send a request and decode the JSON body of a successful response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<T, ClientError> {
        let body = self.request_raw(method, path, payload).await?;
        Ok(codec::from_slice(&body, self.disallow_unknown_fields)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, Payload::None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Payload::json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Payload::json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::DELETE, path, Payload::raw(Bytes::new())).await
    }

    /// Open a websocket to `path`. `http`/`https` endpoints map to
    /// `ws`/`wss`.
    pub async fn ws(&self, path: &str) -> Result<WsConnection, ClientError> {
        let (mut url, headers) = self.url_and_headers(path)?;
        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            // http(s) → ws(s) is always a valid scheme change
            let _ = url.set_scheme(scheme);
        }
        let origin = self
            .websocket_origin
            .as_deref()
            .unwrap_or(DEFAULT_WEBSOCKET_ORIGIN);
        transport::connect_ws(url, headers, origin, self.unix_socket.as_deref()).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("header_token", &self.header_token)
            .field("param_token", &self.param_token)
            .field("unix_socket", &self.unix_socket)
            .finish_non_exhaustive()
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ClientError> {
    let invalid = |reason: String| ClientError::Header {
        name: name.to_owned(),
        reason,
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}
