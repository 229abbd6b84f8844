//! Binding and serving listeners.
//!
//! # Responsibilities
//! - Bind every configured address before serving anything
//! - Roll back (close, unlink unix sockets) when any bind fails
//! - Serve the router on every listener until shutdown or the first failure
//!
//! # Design Decisions
//! - One tokio task per listener, each running `axum::serve`
//! - The first listener failure triggers shutdown of the others
//! - Unix socket files are only removed if this process created them

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinSet;

use super::address::{ListenAddr, TcpFamily};
use crate::lifecycle::Shutdown;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("binding {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("serving {address}: {source}")]
    Serve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("listener task for {address} failed: {reason}")]
    Task { address: String, reason: String },
}

/// The address a listener actually bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl LocalAddr {
    pub fn as_tcp(&self) -> Option<SocketAddr> {
        match self {
            LocalAddr::Tcp(addr) => Some(*addr),
            LocalAddr::Unix(_) => None,
        }
    }
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAddr::Tcp(addr) => write!(f, "tcp!{addr}"),
            LocalAddr::Unix(path) => write!(f, "unix!{}", path.display()),
        }
    }
}

/// Removes a unix socket file when dropped.
#[derive(Debug)]
struct SocketFile {
    path: PathBuf,
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "unix socket removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "removing unix socket"),
        }
    }
}

#[derive(Debug)]
enum Socket {
    Tcp(TcpListener),
    Unix(UnixListener, SocketFile),
}

#[derive(Debug)]
struct Bound {
    local: LocalAddr,
    socket: Socket,
}

impl Bound {
    async fn serve(self, router: Router, shutdown: Shutdown) -> Result<(), ListenerError> {
        let address = self.local.to_string();
        tracing::info!(address = %address, "listening");

        let result = match self.socket {
            Socket::Tcp(listener) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown.signal())
                    .await
            }
            Socket::Unix(listener, _file) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown.signal())
                    .await
            }
        };

        tracing::info!(address = %address, "listener stopped");
        result.map_err(|source| ListenerError::Serve { address, source })
    }
}

/// A set of bound listeners, not yet serving.
#[derive(Debug)]
pub struct Listeners {
    bound: Vec<Bound>,
}

impl Listeners {
    /// Bind every address in `addresses`. Either all are bound, or none is
    /// and the first error is returned.
    pub async fn bind<S: AsRef<str>>(addresses: &[S]) -> Result<Self, ListenerError> {
        let mut bound = Vec::with_capacity(addresses.len());
        for address in addresses {
            let address: ListenAddr = address.as_ref().parse()?;
            match bind_one(&address).await {
                Ok(listener) => bound.push(listener),
                Err(e) => {
                    tracing::error!(address = %address, error = %e, rolled_back = bound.len(), "bind failed");
                    // dropping `bound` closes the sockets and unlinks socket files
                    return Err(e);
                }
            }
        }
        Ok(Self { bound })
    }

    pub fn local_addrs(&self) -> Vec<LocalAddr> {
        self.bound.iter().map(|b| b.local.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Serve `router` on every listener until `shutdown` fires. The first
    /// listener error shuts the others down and is returned.
    pub async fn serve(self, router: Router, shutdown: &Shutdown) -> Result<(), ListenerError> {
        let mut tasks = JoinSet::new();
        let mut addresses = Vec::with_capacity(self.bound.len());
        for bound in self.bound {
            addresses.push(bound.local.to_string());
            tasks.spawn(bound.serve(router.clone(), shutdown.clone()));
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => ListenerError::Task {
                    address: addresses.join(", "),
                    reason: e.to_string(),
                },
            };
            tracing::error!(error = %error, "listener failed, stopping the others");
            shutdown.trigger();
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn bind_one(address: &ListenAddr) -> Result<Bound, ListenerError> {
    let bind_error = |source| ListenerError::Bind {
        address: address.to_string(),
        source,
    };

    match address {
        ListenAddr::Tcp { family, address: host_port } => {
            let listener = match family {
                TcpFamily::Any => TcpListener::bind(host_port.as_str()).await,
                TcpFamily::V4 | TcpFamily::V6 => bind_family(host_port, *family).await,
            }
            .map_err(bind_error)?;
            let local = listener.local_addr().map_err(bind_error)?;
            Ok(Bound {
                local: LocalAddr::Tcp(local),
                socket: Socket::Tcp(listener),
            })
        }
        ListenAddr::Unix(path) => {
            let listener = UnixListener::bind(path).map_err(bind_error)?;
            Ok(Bound {
                local: LocalAddr::Unix(path.clone()),
                socket: Socket::Unix(listener, SocketFile { path: path.clone() }),
            })
        }
    }
}

async fn bind_family(host_port: &str, family: TcpFamily) -> io::Result<TcpListener> {
    let wanted = |addr: &SocketAddr| match family {
        TcpFamily::V4 => addr.is_ipv4(),
        TcpFamily::V6 => addr.is_ipv6(),
        TcpFamily::Any => true,
    };
    let addr = tokio::net::lookup_host(host_port)
        .await?
        .find(wanted)
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address of the requested family"))?;
    TcpListener::bind(addr).await
}
