//! Control-port dispatcher.
//!
//! Listens on the well-known port, answers `DOWNLOAD` requests and hands
//! each accepted one to a new [`TransferWorker`]. The dispatcher never
//! sends data-port traffic and never waits on a worker.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use udpfetch_protocol::constants::SERVER_RECV_BUFFER;
use udpfetch_protocol::{ErrorKind, Request, Response};
use udpfetch_transfer::{ServedDir, ServedFile, TransferError};

use crate::ports::PortAllocator;
use crate::worker::TransferWorker;
use crate::{ServerConfig, ServerError};

/// The udpfetch control endpoint.
pub struct Dispatcher {
    socket: UdpSocket,
    local_addr: SocketAddr,
    served: ServedDir,
    ports: PortAllocator,
    config: ServerConfig,
    workers: TaskTracker,
}

impl Dispatcher {
    /// Binds the control socket described by `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            served: ServedDir::new(&config.served_dir),
            ports: PortAllocator::new(config.bind_addr.ip(), config.port_strategy),
            config,
            workers: TaskTracker::new(),
        })
    }

    /// Address of the control socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of transfers currently in flight.
    pub fn active_transfers(&self) -> usize {
        self.workers.len()
    }

    /// Serves control requests until `cancel` fires.
    ///
    /// Workers are given child tokens of `cancel`, so cancelling it also
    /// stops every in-flight transfer.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.local_addr,
            served_dir = %self.served.root().display(),
            "udpfetch server listening"
        );

        let mut buf = vec![0u8; SERVER_RECV_BUFFER];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("dispatcher shutting down");
                    break;
                }

                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => {
                            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                            self.handle_control(&text, peer, &cancel).await;
                        }
                        // Reported by some platforms after an earlier send
                        // bounced; the control socket itself is fine.
                        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                            tracing::trace!(error = %e, "ignoring connection reset");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "control socket receive error");
                        }
                    }
                }
            }
        }

        self.workers.close();
        Ok(())
    }

    /// Waits for every spawned worker to finish.
    ///
    /// Call after [`run`](Self::run) has returned; workers still serving a
    /// client finish on CLOSE, idle timeout or cancellation.
    pub async fn shutdown(&self) {
        self.workers.close();
        self.workers.wait().await;
        tracing::info!("all transfer workers stopped");
    }

    async fn handle_control(&self, text: &str, peer: SocketAddr, cancel: &CancellationToken) {
        let filename = match text.parse::<Request>() {
            Ok(Request::Download { filename }) => filename,
            Ok(other) => {
                tracing::warn!(%peer, request = %other, "ignoring non-DOWNLOAD request on control port");
                return;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "ignoring invalid control message");
                return;
            }
        };

        tracing::info!(%peer, file = %filename, "download requested");

        let kind = match self.served.lookup(&filename).await {
            Ok(file) => {
                self.spawn_worker(file, peer, cancel.child_token());
                return;
            }
            Err(TransferError::NotFound(_) | TransferError::InvalidName(_)) => ErrorKind::NotFound,
            Err(TransferError::NotAFile(_)) => ErrorKind::NotAFile,
            Err(e) => {
                tracing::error!(%peer, file = %filename, error = %e, "lookup failed");
                ErrorKind::ServerFileError
            }
        };

        tracing::info!(%peer, file = %filename, %kind, "rejecting download");
        let reply = Response::Err { filename, kind };
        if let Err(e) = self.socket.send_to(&reply.to_bytes(), peer).await {
            tracing::warn!(%peer, error = %e, "failed to send control reply");
        }
    }

    /// Allocates a data port and runs a worker, both off the control loop.
    fn spawn_worker(&self, file: ServedFile, peer: SocketAddr, cancel: CancellationToken) {
        let ports = self.ports.clone();
        let served = self.served.clone();
        let idle_timeout = self.config.idle_timeout;

        self.workers.spawn(async move {
            let socket = match ports.allocate().await {
                Ok(socket) => socket,
                Err(e) => {
                    // No socket means no way to tell the client; it will
                    // time out on its DOWNLOAD.
                    tracing::error!(%peer, file = %file.name, error = %e, "data port allocation failed");
                    return;
                }
            };

            let worker = TransferWorker::new(socket, served, file, peer, idle_timeout, cancel);
            tracing::debug!(%peer, port = worker.data_port(), "transfer worker started");
            worker.run().await;
        });
    }
}
