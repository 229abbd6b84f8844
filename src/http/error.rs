//! Error taxonomy for request handling.
//!
//! # Responsibilities
//! - Carry a transport status alongside an error (`ApiError`)
//! - Keep the status an error declares for itself
//! - Classify arbitrary errors into a default status
//! - Render every error as a `{"error": "..."}` response
//!
//! # Design Decisions
//! - `ApiError` does not implement `std::error::Error`. Conversions into it are
//!   explicit: any `HttpStatus` error keeps its declared status, a handful of
//!   common std and serde errors are classified, and other types opt in by
//!   implementing `HttpStatus` or are boxed (`Box<dyn Error + Send + Sync>`)
//! - `StatusError` is the status carrier that survives wrapping: classification
//!   finds it anywhere in a source chain and uses its status
//! - The `NotFound` sentinel maps to 404 with a generic message; its detail is
//!   only logged
//! - Everything else defaults to 400 Bad Request

use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Status used when a request fails every permission predicate.
pub const PERMISSION_DENIED: StatusCode = StatusCode::FORBIDDEN;

/// Implemented by errors that report their own transport status.
///
/// Returning such an error from a handler responds with that status. Wrapper
/// types either implement it by delegating to their source, or carry a
/// `StatusError` as their source so classification finds it.
pub trait HttpStatus {
    fn http_status(&self) -> StatusCode;
}

/// Sentinel for "no such record". Anywhere in an error's source chain, it
/// turns the response into a 404 with the message `not found`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record not found")]
pub struct NotFound;

/// An error with an embedded status that is still found after being wrapped
/// as the source of other errors.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct StatusError {
    status: StatusCode,
    source: BoxError,
}

impl StatusError {
    pub fn new(status: StatusCode, err: impl Into<BoxError>) -> Self {
        Self {
            status,
            source: err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E> From<E> for StatusError
where
    E: HttpStatus + StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err.http_status(), err)
    }
}

/// An error with an embedded HTTP status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
    source: Option<BoxError>,
}

impl ApiError {
    /// Error with an explicit status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Error from a raw status code. Codes outside the valid range fall back
    /// to 400.
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
        Self::new(status, message)
    }

    /// Wrap `err` with an explicit status. The message is the error's
    /// display text.
    pub fn with_status<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = err.into();
        Self {
            status,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Wrap an error that declares its own status.
    pub fn from_status<E>(err: E) -> Self
    where
        E: HttpStatus + StdError + Send + Sync + 'static,
    {
        Self::with_status(err.http_status(), err)
    }

    /// Classify any error, for types that neither implement `HttpStatus` nor
    /// convert with `From`.
    pub fn from_error<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::classify(err.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found")
    }

    pub fn permission_denied() -> Self {
        Self::new(PERMISSION_DENIED, "permission denied")
    }

    /// Assign a status to an arbitrary error by walking its source chain.
    ///
    /// A `StatusError` anywhere in the chain supplies the status, and the
    /// message stays the outer error's text. Otherwise the `NotFound` sentinel
    /// yields 404 and a generic message; anything else yields 400 with the
    /// error's text.
    pub fn classify(err: BoxError) -> Self {
        if let Some(status) = find_in_chain::<StatusError>(&*err).map(StatusError::status) {
            return Self::with_status(status, err);
        }
        if find_in_chain::<NotFound>(&*err).is_some() {
            tracing::debug!(error = %err, "not-found sentinel mapped to 404");
            return Self {
                status: StatusCode::NOT_FOUND,
                message: "not found".to_string(),
                source: Some(err),
            };
        }
        Self::with_status(StatusCode::BAD_REQUEST, err)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message sent to the client.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped error, if any.
    pub fn source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

fn find_in_chain<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

impl<E> From<E> for ApiError
where
    E: HttpStatus + StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::from_status(err)
    }
}

impl From<BoxError> for ApiError {
    fn from(err: BoxError) -> Self {
        Self::classify(err)
    }
}

macro_rules! classified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(err: $ty) -> Self {
                    Self::classify(Box::new(err))
                }
            }
        )*
    };
}

classified!(
    NotFound,
    StatusError,
    std::io::Error,
    std::fmt::Error,
    std::num::ParseIntError,
    std::num::ParseFloatError,
    std::str::Utf8Error,
    std::string::FromUtf8Error,
    serde_json::Error,
    crate::http::codec::DecodeError,
);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiError")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("source", &self.source)
            .finish()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = self.status.as_u16(), error = %self.message, "request failed");
        response::message(self.status, "error", &self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct Lookup(#[source] NotFound);

    #[derive(Debug, Error)]
    #[error("quota exceeded")]
    struct Quota;

    impl HttpStatus for Quota {
        fn http_status(&self) -> StatusCode {
            StatusCode::TOO_MANY_REQUESTS
        }
    }

    #[derive(Debug, Error)]
    #[error("saving order")]
    struct Saving(#[source] StatusError);

    #[test]
    fn plain_errors_default_to_bad_request() {
        let err = ApiError::from(io::Error::other("disk on fire"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "disk on fire");
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_sentinel_hides_detail() {
        let err = ApiError::from(NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "not found");

        let wrapped = ApiError::from_error(Lookup(NotFound));
        assert_eq!(wrapped.status(), StatusCode::NOT_FOUND);
        assert_eq!(wrapped.message(), "not found");
    }

    #[test]
    fn declared_status_is_used_verbatim() {
        let err = ApiError::from(Quota);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message(), "quota exceeded");
        assert_eq!(ApiError::from_status(Quota).status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn status_error_is_found_through_wrappers() {
        let err = ApiError::from_error(Saving(StatusError::from(Quota)));
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message(), "saving order");

        let io = io::Error::other(StatusError::new(StatusCode::CONFLICT, "taken"));
        assert_eq!(ApiError::from(io).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn declared_status_wins_over_not_found() {
        let err = ApiError::from(StatusError::new(StatusCode::GONE, Lookup(NotFound)));
        assert_eq!(err.status(), StatusCode::GONE);
        assert_eq!(err.message(), "lookup failed");
    }

    #[test]
    fn invalid_code_falls_back_to_bad_request() {
        assert_eq!(ApiError::from_code(42, "x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from_code(1000, "x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from_code(409, "x").status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn renders_error_envelope() {
        let response = ApiError::permission_denied().into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            response::CONTENT_TYPE_JSON
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\"error\":\"permission denied\"}\n");
    }
}
