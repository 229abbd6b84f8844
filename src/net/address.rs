//! Listen address syntax.
//!
//! `network!address` with networks `tcp`, `tcp4`, `tcp6` and `unix`, or a
//! bare address: one starting with `/` is a unix socket path, one containing
//! `:` is a TCP address. A TCP address with an empty host (`:8080`) listens
//! on every interface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::ListenerError;

/// TCP address family restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpFamily {
    Any,
    V4,
    V6,
}

/// A parsed listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp { family: TcpFamily, address: String },
    Unix(PathBuf),
}

impl ListenAddr {
    fn tcp(family: TcpFamily, address: &str) -> Result<Self, ListenerError> {
        let Some((host, port)) = address.rsplit_once(':') else {
            return Err(invalid(address, "missing port"));
        };
        if port.parse::<u16>().is_err() {
            return Err(invalid(address, "invalid port"));
        }
        let address = if host.is_empty() {
            match family {
                TcpFamily::V6 => format!("[::]:{port}"),
                TcpFamily::Any | TcpFamily::V4 => format!("0.0.0.0:{port}"),
            }
        } else {
            address.to_owned()
        };
        Ok(ListenAddr::Tcp { family, address })
    }

    fn unix(path: &str) -> Result<Self, ListenerError> {
        if path.is_empty() {
            return Err(invalid(path, "empty socket path"));
        }
        Ok(ListenAddr::Unix(PathBuf::from(path)))
    }

    /// Network name as written in `network!address`.
    pub fn network(&self) -> &'static str {
        match self {
            ListenAddr::Tcp { family: TcpFamily::Any, .. } => "tcp",
            ListenAddr::Tcp { family: TcpFamily::V4, .. } => "tcp4",
            ListenAddr::Tcp { family: TcpFamily::V6, .. } => "tcp6",
            ListenAddr::Unix(_) => "unix",
        }
    }
}

fn invalid(address: &str, reason: &str) -> ListenerError {
    ListenerError::InvalidAddress {
        address: address.to_owned(),
        reason: reason.to_owned(),
    }
}

impl FromStr for ListenAddr {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((network, address)) = s.split_once('!') {
            return match network {
                "tcp" => Self::tcp(TcpFamily::Any, address),
                "tcp4" => Self::tcp(TcpFamily::V4, address),
                "tcp6" => Self::tcp(TcpFamily::V6, address),
                "unix" => Self::unix(address),
                other => Err(invalid(s, &format!("unknown network `{other}`"))),
            };
        }
        if s.starts_with('/') {
            return Self::unix(s);
        }
        if s.contains(':') {
            return Self::tcp(TcpFamily::Any, s);
        }
        Err(invalid(s, "expected network!address, /path or host:port"))
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp { address, .. } => write!(f, "{}!{address}", self.network()),
            ListenAddr::Unix(path) => write!(f, "unix!{}", path.display()),
        }
    }
}
