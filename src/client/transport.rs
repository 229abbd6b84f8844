//! Wire transports for `Client`: reqwest over TCP, hyper HTTP/1 over a unix
//! socket, and tokio-tungstenite for websockets over either.

use std::path::Path;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request as HttpRequest};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::WebSocketStream;
use url::Url;

use super::{ClientError, RawResponse};

/// A byte stream a websocket can run over.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// An open websocket, over TCP or a unix socket.
pub type WsConnection = WebSocketStream<Box<dyn Io>>;

pub(super) async fn send_tcp(
    http: &reqwest::Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
) -> Result<RawResponse, ClientError> {
    let mut request = http.request(method, url).headers(headers);
    if let Some(body) = body {
        request = request.body(body);
    }
    let response = request.send().await?;

    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok(RawResponse {
        status,
        version,
        headers,
        body,
    })
}

async fn connect_unix(socket: &Path) -> Result<UnixStream, ClientError> {
    UnixStream::connect(socket)
        .await
        .map_err(|source| ClientError::Connect {
            address: format!("unix!{}", socket.display()),
            source,
        })
}

fn host_header(url: &Url) -> Option<HeaderValue> {
    let host = url.host_str().unwrap_or("localhost");
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    HeaderValue::from_str(&host).ok()
}

pub(super) async fn send_unix(
    socket: &Path,
    method: Method,
    url: &Url,
    headers: HeaderMap,
    body: Option<Bytes>,
) -> Result<RawResponse, ClientError> {
    let stream = connect_unix(socket).await?;
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "unix socket connection closed");
        }
    });

    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    };
    let mut request = HttpRequest::builder()
        .method(method)
        .uri(target)
        .body(body.map(Body::from).unwrap_or_else(Body::empty))?;
    *request.headers_mut() = headers;
    if let Some(host) = host_header(url) {
        request.headers_mut().insert(header::HOST, host);
    }

    let response = sender.send_request(request).await?;
    let (parts, incoming) = response.into_parts();
    let body = axum::body::to_bytes(Body::new(incoming), usize::MAX)
        .await
        .map_err(|e| ClientError::Body(e.to_string()))?;
    Ok(RawResponse {
        status: parts.status,
        version: parts.version,
        headers: parts.headers,
        body,
    })
}

pub(super) async fn connect_ws(
    url: Url,
    headers: HeaderMap,
    origin: &str,
    socket: Option<&Path>,
) -> Result<WsConnection, ClientError> {
    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().extend(headers);
    let origin = HeaderValue::from_str(origin).map_err(|e| ClientError::Header {
        name: header::ORIGIN.to_string(),
        reason: e.to_string(),
    })?;
    request.headers_mut().insert(header::ORIGIN, origin);

    let stream: Box<dyn Io> = match socket {
        Some(path) => Box::new(connect_unix(path).await?),
        None => {
            // no TLS stack is linked in
            if url.scheme() != "ws" {
                return Err(ClientError::Scheme(url.scheme().to_owned()));
            }
            let host = url.host_str().unwrap_or("localhost");
            let port = url.port_or_known_default().unwrap_or(80);
            let stream = TcpStream::connect((host, port))
                .await
                .map_err(|source| ClientError::Connect {
                    address: format!("tcp!{host}:{port}"),
                    source,
                })?;
            Box::new(stream)
        }
    };

    let (ws, response) = tokio_tungstenite::client_async(request, stream).await?;
    tracing::debug!(%url, status = %response.status(), "websocket connected");
    Ok(ws)
}
