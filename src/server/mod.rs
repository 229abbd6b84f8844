//! Server configuration and the frozen application.
//!
//! # Data Flow
//! ```text
//! Configuration phase (&mut Server):
//!     handle / handle_with → Pattern + IntoEndpoint → Mux
//!     set                   → server Values
//!     use_middleware        → Vec<Middleware>
//!
//! build(self) → App:
//!     Mux → router Handler → middleware fold → entry Handler
//!
//! Request (App):
//!     clone server Values into extensions → entry Handler → Response
//! ```
//!
//! # Design Decisions
//! - `build` consumes the `Server`; nothing can be registered once serving
//! - The `App` is immutable and cheap to clone; no locks on the request path

use std::any::Any;

use crate::config::ServerConfig;
use crate::dispatch::{DispatchConfig, IntoEndpoint, Permission};
use crate::routing::{Mux, Pattern, PatternError};

pub mod app;
pub mod middleware;
pub mod values;

pub use app::App;
pub use middleware::{from_fn, Middleware, Next};
pub use values::{Values, ValuesExt};

/// Route table, value store and middleware, before serving.
#[derive(Default)]
pub struct Server {
    mux: Mux,
    values: Values,
    middleware: Vec<Middleware>,
    dispatch: DispatchConfig,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server using the HTTP limits of `config`, with its `[values]`
    /// seeded into the store as `String`s.
    pub fn with_config(config: &ServerConfig) -> Self {
        let mut server = Self::new();
        server.dispatch.body_limit = config.http.body_limit;
        for (key, value) in &config.values {
            server.set(key.clone(), value.clone());
        }
        server
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch
    }

    /// Assign a server-wide value, visible to every request.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.values.set(key, value);
        self
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Register `handler` under `pattern`.
    ///
    /// # Panics
    ///
    /// If `pattern` is not a valid route pattern. Handler shapes are checked
    /// at compile time.
    pub fn handle<M, H>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: IntoEndpoint<M>,
    {
        self.handle_with(pattern, handler, Vec::new())
    }

    /// Register `handler` under `pattern`, runnable only when one of
    /// `permissions` approves the request.
    ///
    /// # Panics
    ///
    /// If `pattern` is not a valid route pattern.
    pub fn handle_with<M, H>(
        &mut self,
        pattern: &str,
        handler: H,
        permissions: Vec<Permission>,
    ) -> &mut Self
    where
        H: IntoEndpoint<M>,
    {
        if let Err(e) = self.try_handle_with(pattern, handler, permissions) {
            panic!("cannot register {pattern:?}: {e}");
        }
        self
    }

    /// Like `handle`, returning pattern errors instead of panicking.
    pub fn try_handle<M, H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, PatternError>
    where
        H: IntoEndpoint<M>,
    {
        self.try_handle_with(pattern, handler, Vec::new())
    }

    pub fn try_handle_with<M, H>(
        &mut self,
        pattern: &str,
        handler: H,
        permissions: Vec<Permission>,
    ) -> Result<&mut Self, PatternError>
    where
        H: IntoEndpoint<M>,
    {
        let pattern = Pattern::parse(pattern)?;
        let endpoint = handler.into_endpoint(&self.dispatch).guarded(permissions);
        self.mux.insert(pattern, endpoint);
        Ok(self)
    }

    /// Append a middleware. The last one added sees requests first.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> Vec<String> {
        self.mux.routes().iter().map(|r| r.pattern.to_string()).collect()
    }

    /// Freeze the configuration into an `App`, composing the middleware
    /// chain around the router.
    pub fn build(self) -> App {
        let patterns = self.patterns();
        tracing::debug!(
            routes = patterns.len(),
            middleware = self.middleware.len(),
            values = self.values.len(),
            "building application"
        );
        let router = self.mux.into_handler();
        let entry = middleware::build_chain(&self.middleware, router);
        App::new(entry, self.values, patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ApiError, Request};

    async fn hello(_req: Request) -> Result<&'static str, ApiError> {
        Ok("hello")
    }

    #[test]
    fn try_handle_reports_pattern_errors() {
        let mut server = Server::new();
        assert_eq!(server.try_handle("", hello).err(), Some(PatternError::Empty));
        assert_eq!(
            server.try_handle("fetch /x", hello).err(),
            Some(PatternError::InvalidMethod("fetch".into()))
        );
        assert!(server.try_handle("GET /x", hello).is_ok());
        assert_eq!(server.patterns(), vec!["GET /x"]);
    }

    #[test]
    #[should_panic(expected = "must start with '/'")]
    fn handle_panics_on_relative_path() {
        Server::new().handle("hello", hello);
    }

    #[test]
    fn config_seeds_values_and_limits() {
        let mut config = ServerConfig::default();
        config.http.body_limit = 64;
        config.values.insert("region".into(), "eu-west".into());

        let server = Server::with_config(&config);
        assert_eq!(server.dispatch_config().body_limit, 64);
        assert_eq!(server.get::<String>("region").map(String::as_str), Some("eu-west"));
    }
}
