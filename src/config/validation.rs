//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check listen addresses parse
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: &ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::net::ListenAddr;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no listen address configured")]
    NoListenAddress,

    #[error("listen address `{address}`: {reason}")]
    ListenAddress { address: String, reason: String },

    #[error("http.body_limit must be greater than zero")]
    ZeroBodyLimit,

    #[error("http.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("logging.filter `{0}` is not a valid filter")]
    LogFilter(String),

    #[error("metrics.address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.is_empty() {
        errors.push(ValidationError::NoListenAddress);
    }
    for address in &config.listen {
        if let Err(e) = address.parse::<ListenAddr>() {
            errors.push(ValidationError::ListenAddress {
                address: address.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.http.body_limit == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if tracing_subscriber::EnvFilter::try_new(&config.logging.filter).is_err() {
        errors.push(ValidationError::LogFilter(config.logging.filter.clone()));
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(config.metrics.address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listen = vec!["carrier-pigeon".to_string()];
        config.http.body_limit = 0;
        config.http.request_timeout_secs = 0;
        config.metrics.enabled = true;
        config.metrics.address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::ListenAddress { .. }));
        assert_eq!(errors[1], ValidationError::ZeroBodyLimit);
        assert_eq!(errors[2], ValidationError::ZeroTimeout);
        assert_eq!(errors[3], ValidationError::MetricsAddress("nowhere".into()));
    }

    #[test]
    fn empty_listen_list() {
        let mut config = ServerConfig::default();
        config.listen.clear();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::NoListenAddress])
        );
    }
}
