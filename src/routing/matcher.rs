//! Route patterns.
//!
//! # Syntax
//! `"[METHOD ]/path"`. A path ending in `/` matches every path below it;
//! any other path matches exactly. `GET` patterns also serve `HEAD`.
//!
//! # Design Decisions
//! - Case-sensitive path comparison, no regex, no wildcards
//! - Longer paths are more specific; a method-qualified pattern beats an
//!   unqualified one with the same path

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use thiserror::Error;

/// Why a pattern was rejected at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("invalid method `{0}` in pattern")]
    InvalidMethod(String),

    #[error("path `{0}` must start with '/'")]
    MissingLeadingSlash(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    method: Option<Method>,
    path: String,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let (method, path) = match pattern.split_once(char::is_whitespace) {
            Some((method, path)) => {
                let valid = !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase());
                let method = Method::from_bytes(method.as_bytes())
                    .ok()
                    .filter(|_| valid)
                    .ok_or_else(|| PatternError::InvalidMethod(method.to_owned()))?;
                (Some(method), path.trim_start())
            }
            None => (None, pattern),
        };

        if !path.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(path.to_owned()));
        }

        Ok(Self {
            method,
            path: path.to_owned(),
        })
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this pattern covers a whole subtree.
    pub fn is_subtree(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Specificity of the match of `path` against this pattern, or `None`
    /// when it does not match. Higher is more specific.
    pub fn match_path(&self, path: &str) -> Option<usize> {
        let matched = if self.is_subtree() {
            path.starts_with(&self.path)
        } else {
            path == self.path
        };
        matched.then(|| self.path.len() * 2 + usize::from(self.method.is_some()))
    }

    /// Whether requests with `method` are served by this pattern.
    pub fn allows(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(m) if m == method => true,
            Some(m) => *m == Method::GET && *method == Method::HEAD,
        }
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} {}", self.path),
            None => f.write_str(&self.path),
        }
    }
}
