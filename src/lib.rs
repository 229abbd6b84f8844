//! api-mux: typed handler dispatch for JSON HTTP APIs.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod server;

pub use client::Client;
pub use config::ServerConfig;
pub use dispatch::{permission, HandlerShape, IntoEndpoint, Permission, RawService};
pub use http::websocket;
pub use http::{ApiError, HttpStatus, NotFound, Reply, Request, StatusError, WithStatus};
pub use lifecycle::Shutdown;
pub use net::Listeners;
pub use server::{from_fn, App, Middleware, Next, Server, Values, ValuesExt};
