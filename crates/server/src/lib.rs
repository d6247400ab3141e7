//! Server side of udpfetch.
//!
//! A [`Dispatcher`] owns the well-known control socket and answers
//! `DOWNLOAD` requests. Every accepted request gets its own
//! [`TransferWorker`] on a freshly allocated data port, so transfers never
//! share a socket or a file handle.

mod dispatcher;
mod ports;
mod worker;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use udpfetch_protocol::constants::WORKER_IDLE_TIMEOUT;

pub use dispatcher::Dispatcher;
pub use ports::{PortAllocator, PortStrategy};
pub use worker::{TransferWorker, WorkerExit};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the control socket.
    pub bind_addr: SocketAddr,
    /// Directory whose regular files may be downloaded.
    pub served_dir: PathBuf,
    /// How data ports are chosen.
    pub port_strategy: PortStrategy,
    /// A worker gives up after this long without a request.
    pub idle_timeout: Duration,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, served_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            served_dir: served_dir.into(),
            port_strategy: PortStrategy::default(),
            idle_timeout: WORKER_IDLE_TIMEOUT,
        }
    }

    /// Checks the values that cannot be caught by the type system.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.idle_timeout.is_zero() {
            return Err(ServerError::InvalidConfig(
                "idle timeout must be greater than zero".into(),
            ));
        }
        self.port_strategy.validate()
    }
}

/// Errors produced by the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("no free data port in {low}-{high} after {attempts} attempts")]
    PortsExhausted { low: u16, high: u16, attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_uses_protocol_defaults() {
        let config = ServerConfig::new(([127, 0, 0, 1], 9000).into(), "files");
        assert_eq!(config.idle_timeout, WORKER_IDLE_TIMEOUT);
        assert_eq!(config.port_strategy, PortStrategy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let mut config = ServerConfig::new(([127, 0, 0, 1], 9000).into(), "files");
        config.idle_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }
}
