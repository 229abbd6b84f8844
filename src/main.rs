//! api-server: a small JSON API served by `api_mux`.
//!
//! ```text
//! config (TOML) → logging → metrics exporter (optional)
//!     → Server (routes, values, middleware) → App
//!     → Listeners::bind → serve until Ctrl-C / SIGTERM
//! ```

use std::path::PathBuf;

use api_mux::config::{load_config, ServerConfig};
use api_mux::http::websocket::{self, Message, WebSocket};
use api_mux::lifecycle::signals;
use api_mux::observability::{logging, metrics};
use api_mux::{from_fn, permission, ApiError, Listeners, Next, NotFound, Request, Server, Shutdown, ValuesExt};
use axum::Json;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "api-server", version, about = "Serve the api-mux demo API")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (`tcp!host:port`, `unix!/path`, `:port`); repeatable,
    /// replaces the configured list
    #[arg(short, long)]
    listen: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize, Serialize)]
struct Echo {
    message: String,
    #[serde(default)]
    repeat: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if !cli.listen.is_empty() {
        config.listen = cli.listen;
    }

    logging::init(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-server starting");

    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.metrics.address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let app = routes(&config).build();
    tracing::info!(routes = ?app.patterns(), "routes registered");

    let listeners = Listeners::bind(config.listen.as_slice()).await?;
    let shutdown = Shutdown::new();
    signals::trigger_on_terminate(&shutdown);

    listeners.serve(app.into_router(&config.http), &shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn routes(config: &ServerConfig) -> Server {
    let mut server = Server::with_config(config);

    server
        .handle("GET /health", |_req: Request| async {
            Ok::<_, ApiError>(Json(Health {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
            }))
        })
        .handle("GET /version", |_req: Request| async {
            Ok::<_, ApiError>(format!("api-server {}", env!("CARGO_PKG_VERSION")))
        })
        .handle("POST /echo", echo)
        .handle("GET /values/", value)
        .handle_with(
            "GET /admin/values",
            |req: Request| async move {
                let keys: Vec<String> = req.values().keys().map(str::to_owned).collect();
                Ok::<_, ApiError>(Json(keys))
            },
            vec![permission(|req| {
                let expected = req.get::<String>("admin_token").map(|t| format!("Bearer {t}"));
                expected.is_some() && req.header("authorization") == expected.as_deref()
            })],
        )
        .handle(
            "/ws",
            websocket::upgrade(echo_socket)
                .fallback(|_req: Request| async { Err::<(), _>(ApiError::bad_request("connect with a websocket client")) }),
        );

    server.use_middleware(from_fn(|mut req, next: Next| async move {
        let id = req
            .headers()
            .get(api_mux::observability::tracing::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(id) = id {
            req.values_mut().set("request_id", id);
        }
        next.run(req).await
    }));

    server
}

async fn echo(req: Request, body: Echo) -> Result<Json<Echo>, ApiError> {
    if body.message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let repeat = body.repeat.unwrap_or(1).min(16) as usize;
    tracing::debug!(request_id = ?req.get::<String>("request_id"), repeat, "echo");
    Ok(Json(Echo {
        message: vec![body.message.as_str(); repeat].join(" "),
        repeat: body.repeat,
    }))
}

async fn value(req: Request) -> Result<String, NotFound> {
    let key = req.path().strip_prefix("/values/").unwrap_or_default();
    req.get::<String>(key).cloned().ok_or(NotFound)
}

async fn echo_socket(_req: Request, mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let reply = match message {
            Message::Text(text) => Message::Text(text),
            Message::Binary(bytes) => Message::Binary(bytes),
            Message::Close(_) => break,
            _ => continue,
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }
}
