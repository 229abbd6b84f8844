//! Handler shapes accepted at registration.
//!
//! A callable is classified by which `IntoEndpoint<M>` impl it satisfies; the
//! marker `M` is inferred and never named by callers:
//!
//! | shape     | callable                                               |
//! |-----------|--------------------------------------------------------|
//! | `Service` | `RawService(tower::Service<http::Request<Body>>)`      |
//! | `Raw`     | `Fn(http::Request<Body>) -> Future<Output: IntoResponse>` |
//! | `Unary`   | `Fn(Request) -> Future<Output = Result<O, E>>`          |
//! | `Decoded` | `Fn(Request, I) -> Future<Output = Result<O, E>>`       |
//! | `Upgrade` | `websocket::upgrade(...)`                               |
//!
//! with `O: Reply`, `E: Into<ApiError>` and `I: DeserializeOwned`. A
//! callable with the wrong arity, a first argument other than `Request`, or a
//! result that is not `Result<_, impl Into<ApiError>>` matches none of them.

use std::fmt;

use super::{DispatchConfig, Endpoint};

/// Classification of a registered callable, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerShape {
    /// A transport-level `tower::Service`.
    Service { service: &'static str },
    /// A transport-level function.
    Raw,
    /// Handler taking only the request.
    Unary { output: &'static str },
    /// Handler taking the request and a decoded body.
    Decoded {
        input: &'static str,
        output: &'static str,
    },
    /// Websocket upgrade, with the shape of the fallback handler if any.
    Upgrade { fallback: Option<Box<HandlerShape>> },
}

impl HandlerShape {
    /// Whether requests reaching this shape have their body decoded.
    pub fn reads_body(&self) -> bool {
        matches!(self, HandlerShape::Decoded { .. })
    }
}

impl fmt::Display for HandlerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerShape::Service { service } => write!(f, "service {service}"),
            HandlerShape::Raw => f.write_str("fn(http::Request) -> Response"),
            HandlerShape::Unary { output } => write!(f, "fn(Request) -> Result<{output}>"),
            HandlerShape::Decoded { input, output } => {
                write!(f, "fn(Request, {input}) -> Result<{output}>")
            }
            HandlerShape::Upgrade { fallback: None } => f.write_str("websocket"),
            HandlerShape::Upgrade {
                fallback: Some(shape),
            } => write!(f, "websocket, fallback {shape}"),
        }
    }
}

/// Conversion of a callable into an endpoint.
pub trait IntoEndpoint<M>: Sized + Send + Sync + 'static {
    fn into_endpoint(self, config: &DispatchConfig) -> Endpoint;
}

/// Markers selecting an `IntoEndpoint` impl.
pub mod marker {
    use std::marker::PhantomData;

    pub struct Service;
    pub struct Raw;
    pub struct Unary;
    pub struct Decoded<I>(PhantomData<fn() -> I>);
    pub struct Upgrade;
}
