//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use api_mux::config::HttpConfig;
use api_mux::net::{ListenerError, LocalAddr};
use api_mux::{App, Client, Listeners, Shutdown};
use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// An `App` serving on real listeners in a background task.
pub struct Running {
    pub addrs: Vec<LocalAddr>,
    pub shutdown: Shutdown,
    task: JoinHandle<Result<(), ListenerError>>,
}

impl Running {
    pub fn tcp_client(&self) -> Client {
        let addr = self
            .addrs
            .iter()
            .find_map(LocalAddr::as_tcp)
            .expect("no tcp listener");
        Client::new(format!("http://{addr}"))
    }

    pub fn unix_client(&self) -> Client {
        let path = self
            .addrs
            .iter()
            .find_map(|addr| match addr {
                LocalAddr::Unix(path) => Some(path.clone()),
                LocalAddr::Tcp(_) => None,
            })
            .expect("no unix listener");
        Client::new("http://localhost").with_unix_socket(path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task
            .await
            .expect("listener task panicked")
            .expect("listener failed");
    }
}

/// Serve `app` on `addresses` until the returned handle is stopped.
pub async fn start<S: AsRef<str>>(app: App, addresses: &[S]) -> Running {
    let listeners = Listeners::bind(addresses).await.expect("bind");
    let addrs = listeners.local_addrs();
    let shutdown = Shutdown::new();
    let router = app.into_router(&HttpConfig::default());
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { listeners.serve(router, &shutdown).await })
    };
    Running {
        addrs,
        shutdown,
        task,
    }
}

/// `unix!` address for a socket in `dir`.
pub fn unix_address(dir: &tempfile::TempDir, name: &str) -> (String, PathBuf) {
    let path = dir.path().join(name);
    (format!("unix!{}", path.display()), path)
}

/// Send one request through `app` without a network.
pub async fn call(app: &App, request: HttpRequest<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8(body.to_vec()).expect("utf-8 body"))
}

pub fn get(uri: &str) -> HttpRequest<Body> {
    HttpRequest::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> HttpRequest<Body> {
    HttpRequest::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}
