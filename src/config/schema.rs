//! Configuration schema definitions.
//!
//! This module defines the configuration of the `api-server` binary.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid config.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_BODY_LIMIT;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen addresses (`"unix!/run/app.sock"`, `"tcp!:8080"`, `":8080"`, ...).
    pub listen: Vec<String>,

    /// HTTP handling limits.
    pub http: HttpConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,

    /// String values seeded into the server value store.
    pub values: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: vec![":8080".to_string()],
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            values: BTreeMap::new(),
        }
    }
}

/// HTTP handling limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Largest request body a decoding handler reads, in bytes.
    pub body_limit: usize,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for production.
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set.
    pub filter: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "api_mux=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Scrape endpoint address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}
