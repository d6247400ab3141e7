//! Data-port allocation.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;

use udpfetch_protocol::constants::{
    DATA_PORT_BIND_ATTEMPTS, DATA_PORT_BIND_PAUSE, DATA_PORT_RANGE_HIGH, DATA_PORT_RANGE_LOW,
};

use crate::ServerError;

/// How a transfer's data port is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStrategy {
    /// Let the OS pick a free port.
    Ephemeral,
    /// Try random ports in `low..=high`, pausing between failed binds.
    Range {
        low: u16,
        high: u16,
        attempts: u32,
        pause: Duration,
    },
}

impl Default for PortStrategy {
    fn default() -> Self {
        Self::Range {
            low: DATA_PORT_RANGE_LOW,
            high: DATA_PORT_RANGE_HIGH,
            attempts: DATA_PORT_BIND_ATTEMPTS,
            pause: DATA_PORT_BIND_PAUSE,
        }
    }
}

impl PortStrategy {
    pub fn validate(&self) -> Result<(), ServerError> {
        match *self {
            Self::Ephemeral => Ok(()),
            Self::Range { low, high, .. } if low == 0 || low > high => Err(
                ServerError::InvalidConfig(format!("invalid data port range {low}-{high}")),
            ),
            Self::Range { attempts: 0, .. } => Err(ServerError::InvalidConfig(
                "data port bind attempts must be at least 1".into(),
            )),
            Self::Range { .. } => Ok(()),
        }
    }
}

/// Binds one UDP socket per transfer.
///
/// Holds no record of handed-out ports; the OS bind decides conflicts, so
/// one allocator can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    ip: IpAddr,
    strategy: PortStrategy,
}

impl PortAllocator {
    pub fn new(ip: IpAddr, strategy: PortStrategy) -> Self {
        Self { ip, strategy }
    }

    pub fn strategy(&self) -> PortStrategy {
        self.strategy
    }

    /// Binds a fresh data socket.
    ///
    /// With [`PortStrategy::Range`], an address already in use is retried
    /// on another random port; any other bind error ends the allocation
    /// at once.
    pub async fn allocate(&self) -> Result<UdpSocket, ServerError> {
        match self.strategy {
            PortStrategy::Ephemeral => {
                let addr = SocketAddr::new(self.ip, 0);
                UdpSocket::bind(addr)
                    .await
                    .map_err(|source| ServerError::Bind { addr, source })
            }
            PortStrategy::Range {
                low,
                high,
                attempts,
                pause,
            } => {
                for attempt in 1..=attempts {
                    let port = rand::thread_rng().gen_range(low..=high);
                    let addr = SocketAddr::new(self.ip, port);
                    match UdpSocket::bind(addr).await {
                        Ok(socket) => {
                            tracing::debug!(port, attempt, "data port bound");
                            return Ok(socket);
                        }
                        Err(e) if e.kind() == ErrorKind::AddrInUse => {
                            tracing::debug!(port, attempt, attempts, "data port in use, trying another");
                            if attempt < attempts {
                                tokio::time::sleep(pause).await;
                            }
                        }
                        Err(source) => return Err(ServerError::Bind { addr, source }),
                    }
                }
                Err(ServerError::PortsExhausted {
                    low,
                    high,
                    attempts,
                })
            }
        }
    }
}
