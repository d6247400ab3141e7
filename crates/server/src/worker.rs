//! Per-transfer worker.
//!
//! A worker owns one data socket and one open file. It answers chunk
//! requests in whatever order they arrive and re-serves ranges on demand,
//! which is what makes client retransmission safe.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use udpfetch_protocol::constants::{MAX_CHUNK_SIZE, SERVER_RECV_BUFFER};
use udpfetch_protocol::{ChunkRange, ErrorKind, Request, Response};
use udpfetch_transfer::{ChunkReader, ServedDir, ServedFile, TransferError};

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The client closed the transfer.
    Closed,
    /// No request arrived within the idle window.
    IdleTimeout,
    /// The file could not be opened or read; an `ERR` reply was sent.
    FileError,
    /// The data socket failed.
    SocketError,
    /// The server is shutting down.
    Cancelled,
}

/// Serves one file to one client over a dedicated data socket.
pub struct TransferWorker {
    socket: UdpSocket,
    served: ServedDir,
    file: ServedFile,
    client: SocketAddr,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl TransferWorker {
    pub fn new(
        socket: UdpSocket,
        served: ServedDir,
        file: ServedFile,
        client: SocketAddr,
        idle_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            socket,
            served,
            file,
            client,
            idle_timeout,
            cancel,
        }
    }

    /// Port of the data socket, as announced in the `OK` reply.
    pub fn data_port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Runs the transfer to completion.
    ///
    /// The data socket is dropped on return, whatever the exit path.
    pub async fn run(self) -> WorkerExit {
        let span = tracing::info_span!(
            "worker",
            file = %self.file.name,
            peer = %self.client,
            port = self.data_port()
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> WorkerExit {
        // The file may have changed since the dispatcher looked it up.
        let mut reader = match self.reopen().await {
            Ok(reader) => reader,
            Err(kind) => {
                let err = Response::Err {
                    filename: self.file.name.clone(),
                    kind,
                };
                self.reply(&err, self.client).await;
                return WorkerExit::FileError;
            }
        };

        let ok = Response::Ok {
            filename: self.file.name.clone(),
            size: self.file.size,
            port: self.data_port(),
        };
        tracing::info!(size = self.file.size, "handshake sent");
        self.reply(&ok, self.client).await;

        let exit = self.serve(&mut reader).await;
        tracing::info!(?exit, "transfer worker finished");
        exit
    }

    async fn reopen(&mut self) -> Result<ChunkReader, ErrorKind> {
        let fresh = match self.served.lookup(&self.file.name).await {
            Ok(file) => file,
            Err(TransferError::NotFound(_)) => {
                tracing::warn!("file vanished before transfer");
                return Err(ErrorKind::NotFound);
            }
            Err(e) => {
                tracing::warn!(error = %e, "file no longer servable");
                return Err(ErrorKind::ServerFileError);
            }
        };
        self.file = fresh;

        match self.served.open(&self.file).await {
            Ok(reader) => Ok(reader),
            Err(TransferError::NotFound(_)) => Err(ErrorKind::NotFound),
            Err(e) => {
                tracing::error!(error = %e, "cannot open file for reading");
                Err(ErrorKind::ServerFileError)
            }
        }
    }

    async fn serve(&self, reader: &mut ChunkReader) -> WorkerExit {
        let mut buf = vec![0u8; SERVER_RECV_BUFFER];

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => return WorkerExit::Cancelled,
                r = tokio::time::timeout(self.idle_timeout, self.socket.recv_from(&mut buf)) => r,
            };

            let (n, from) = match received {
                Err(_) => {
                    tracing::info!(
                        idle_ms = self.idle_timeout.as_millis() as u64,
                        "no request within idle window"
                    );
                    return WorkerExit::IdleTimeout;
                }
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) if is_transient(&e) => {
                    tracing::trace!(error = %e, "transient receive error");
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "data socket failed");
                    return WorkerExit::SocketError;
                }
            };

            let text = String::from_utf8_lossy(&buf[..n]);
            let request = match text.parse::<Request>() {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(%from, error = %e, "dropping malformed request");
                    continue;
                }
            };

            if request.filename() != self.file.name {
                tracing::warn!(%from, requested = request.filename(), "dropping request for another file");
                continue;
            }

            match request {
                Request::Get { range, .. } => {
                    if let Some(exit) = self.serve_range(reader, range, from).await {
                        return exit;
                    }
                }
                Request::Close { .. } => {
                    let close_ok = Response::CloseOk {
                        filename: self.file.name.clone(),
                    };
                    self.reply(&close_ok, from).await;
                    return WorkerExit::Closed;
                }
                Request::Download { .. } => {
                    tracing::warn!(%from, "dropping DOWNLOAD sent to a data port");
                }
            }
        }
    }

    /// Answers one chunk request. Returns `Some` when the worker must stop.
    async fn serve_range(
        &self,
        reader: &mut ChunkReader,
        range: ChunkRange,
        from: SocketAddr,
    ) -> Option<WorkerExit> {
        if !range.fits_within(self.file.size) || range.len() > MAX_CHUNK_SIZE {
            tracing::warn!(
                %from,
                start = range.start(),
                end = range.end(),
                size = self.file.size,
                "dropping out-of-range request"
            );
            return None;
        }

        let data = match reader.read_range(range).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                tracing::error!(start = range.start(), "file shrank during transfer");
                self.send_file_error(from).await;
                return Some(WorkerExit::FileError);
            }
            Err(e) => {
                tracing::error!(error = %e, start = range.start(), "read failed");
                self.send_file_error(from).await;
                return Some(WorkerExit::FileError);
            }
        };

        tracing::debug!(start = range.start(), end = range.end(), len = data.len(), "serving chunk");
        let chunk = Response::Chunk {
            filename: self.file.name.clone(),
            range,
            data,
        };
        self.reply(&chunk, from).await;
        None
    }

    async fn send_file_error(&self, to: SocketAddr) {
        let err = Response::Err {
            filename: self.file.name.clone(),
            kind: ErrorKind::ServerFileError,
        };
        self.reply(&err, to).await;
    }

    /// Sends a reply. A failed send is logged; the client retransmits.
    async fn reply(&self, response: &Response, to: SocketAddr) {
        if let Err(e) = self.socket.send_to(&response.to_bytes(), to).await {
            tracing::warn!(peer = %to, error = %e, "failed to send reply");
        }
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionRefused
    )
}
