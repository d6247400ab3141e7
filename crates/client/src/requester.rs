//! Requester state machine.
//!
//! ```text
//! IDLE -> AWAIT_HANDSHAKE -> TRANSFERRING -> AWAIT_CLOSE -> DONE
//!              \                  \
//!               `------------------`----------> ABORTED
//! ```
//!
//! Replies are not correlated with the request that caused them, so a
//! late answer to an earlier retransmission can arrive at any point. A
//! reply of the wrong kind, for another file, or for another offset is
//! discarded; the request is sent again only when the current attempt's
//! window runs out, exactly as for a plain timeout.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::Instrument;

use udpfetch_channel::{ChannelError, Reply, Transport, exchange_until};
use udpfetch_protocol::{ChunkRange, ErrorKind, Request, Response};
use udpfetch_transfer::{
    OutputFile, Outcome, ProgressMeter, TransferSession, file_checksum, validate_file_name,
};

use crate::RequesterConfig;
use crate::error::{DownloadError, handshake_failure};

/// Summary of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub filename: String,
    /// Size announced by the server.
    pub size: u64,
    pub bytes_written: u64,
    pub chunks: u64,
    /// Sends beyond the first for every request of the session.
    pub retransmits: u64,
    /// Whether the server confirmed the CLOSE.
    pub close_confirmed: bool,
    /// Hex SHA-256 of the written file.
    pub sha256: String,
    pub path: PathBuf,
    pub elapsed: Duration,
}

/// Result for one entry of a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub filename: String,
    pub result: Result<DownloadReport, DownloadError>,
}

impl BatchEntry {
    pub fn outcome(&self) -> Outcome {
        match &self.result {
            Ok(_) => Outcome::Success,
            Err(e) => e.outcome(),
        }
    }
}

/// Per-file results of [`Requester::download_batch`], in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    /// Number of entries that ended with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome() == outcome)
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.count(Outcome::Success) == self.entries.len()
    }

    /// Bytes written across all successful downloads.
    pub fn bytes_written(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().ok())
            .map(|r| r.bytes_written)
            .sum()
    }
}

/// What to do with a reply that parsed cleanly.
enum Verdict<V> {
    Accept(V),
    Discard(&'static str),
    Fail(DownloadError),
}

/// Downloads files from one server, one at a time.
pub struct Requester<T: Transport = UdpSocket> {
    transport: T,
    config: RequesterConfig,
}

impl Requester<UdpSocket> {
    /// Binds a local socket of the server address's family.
    pub async fn bind(config: RequesterConfig) -> Result<Self, DownloadError> {
        let any: IpAddr = match config.server_addr {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let socket = UdpSocket::bind(SocketAddr::new(any, 0)).await?;
        Ok(Self::with_transport(socket, config))
    }
}

impl<T: Transport> Requester<T> {
    pub fn with_transport(transport: T, config: RequesterConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Downloads every name in order.
    ///
    /// A failed file is recorded and the batch moves on to the next one.
    pub async fn download_batch<I, S>(&self, names: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for name in names {
            let name = name.as_ref();
            let result = self.download(name).await;
            if let Err(e) = &result {
                tracing::warn!(file = name, outcome = ?e.outcome(), error = %e, "download failed, continuing");
            }
            report.entries.push(BatchEntry {
                filename: name.to_string(),
                result,
            });
        }
        tracing::info!(
            total = report.entries.len(),
            succeeded = report.count(Outcome::Success),
            incomplete = report.count(Outcome::Incomplete),
            aborted = report.count(Outcome::Aborted),
            "batch finished"
        );
        report
    }

    /// Downloads one file into the output directory.
    pub async fn download(&self, filename: &str) -> Result<DownloadReport, DownloadError> {
        let span = tracing::info_span!("download", file = filename);
        self.run_session(filename).instrument(span).await
    }

    async fn run_session(&self, filename: &str) -> Result<DownloadReport, DownloadError> {
        validate_file_name(filename)?;
        let started = Instant::now();
        let mut retransmits = 0u64;

        tracing::debug!(state = "AWAIT_HANDSHAKE", server = %self.config.server_addr, "requesting download");
        let (size, port) = self.handshake(filename, &mut retransmits).await?;
        let data_addr = SocketAddr::new(self.config.server_addr.ip(), port);
        tracing::info!(size, port, "server accepted download");

        let mut output = OutputFile::create(&self.config.output_dir, filename).await?;
        let mut session = TransferSession::new(filename, size, port);
        let mut meter = ProgressMeter::new(size);

        tracing::debug!(state = "TRANSFERRING", "starting chunk loop");
        while let Some(range) = session.next_range(self.config.max_chunk) {
            let data = self
                .fetch_chunk(&session, range, data_addr, &mut retransmits)
                .await?;
            output.write_at(range.start(), &data).await?;
            session.accept(range.start(), data.len() as u64)?;

            if let Some(pct) = meter.record(session.offset(), data.len() as u64) {
                tracing::info!(
                    progress = pct,
                    received = session.offset(),
                    size,
                    bytes_per_sec = meter.bytes_per_second() as u64,
                    "download progress"
                );
            }
        }

        let bytes_written = output.high_water();
        let path = output.finish().await?;

        tracing::debug!(state = "AWAIT_CLOSE", "closing transfer");
        let close_confirmed = self.close(filename, data_addr, &mut retransmits).await;

        let sha256 = file_checksum(&path).await?;
        let elapsed = started.elapsed();
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            (bytes_written as f64 / secs) as u64
        } else {
            0
        };
        tracing::info!(
            state = "DONE",
            bytes = bytes_written,
            chunks = session.chunks(),
            retransmits,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes_per_sec,
            %sha256,
            "download complete"
        );

        Ok(DownloadReport {
            filename: filename.to_string(),
            size,
            bytes_written,
            chunks: session.chunks(),
            retransmits,
            close_confirmed,
            sha256,
            path,
            elapsed,
        })
    }

    /// AWAIT_HANDSHAKE: returns the announced size and data port.
    async fn handshake(
        &self,
        filename: &str,
        retransmits: &mut u64,
    ) -> Result<(u64, u16), DownloadError> {
        let request = Request::Download {
            filename: filename.to_string(),
        };
        let result = self
            .request(&request, self.config.server_addr, retransmits, |response| {
                match response {
                    Response::Ok {
                        filename: f,
                        size,
                        port,
                    } if f == filename => Verdict::Accept((size, port)),
                    Response::Err { filename: f, kind } if f == filename => {
                        Verdict::Fail(rejected(filename, kind))
                    }
                    _ => Verdict::Discard("reply does not answer this DOWNLOAD"),
                }
            })
            .await;

        match result {
            Ok(accepted) => Ok(accepted),
            Err(Failure::Channel(e)) => {
                tracing::warn!(state = "ABORTED", error = %e, "server unreachable");
                Err(handshake_failure(e))
            }
            Err(Failure::Download(e)) => {
                tracing::warn!(state = "ABORTED", error = %e, "handshake failed");
                Err(e)
            }
        }
    }

    /// TRANSFERRING: fetches the payload for `range`, which starts at the
    /// session's current offset.
    async fn fetch_chunk(
        &self,
        session: &TransferSession,
        range: ChunkRange,
        data_addr: SocketAddr,
        retransmits: &mut u64,
    ) -> Result<Vec<u8>, DownloadError> {
        let filename = session.filename();
        let request = Request::Get {
            filename: filename.to_string(),
            range,
        };
        tracing::trace!(start = range.start(), end = range.end(), "requesting chunk");

        let result = self
            .request(&request, data_addr, retransmits, |response| match response {
                Response::Chunk {
                    filename: f,
                    range: got,
                    data,
                } if f == filename => {
                    if got.start() != range.start() {
                        return Verdict::Discard("chunk for another offset");
                    }
                    let len = data.len() as u64;
                    if len == 0 {
                        Verdict::Fail(DownloadError::Protocol(format!(
                            "empty chunk at offset {}",
                            range.start()
                        )))
                    } else if len > range.len() || len > session.remaining() {
                        Verdict::Fail(DownloadError::Protocol(format!(
                            "chunk of {len} bytes at offset {} exceeds the requested range",
                            range.start()
                        )))
                    } else {
                        Verdict::Accept(data)
                    }
                }
                Response::Err { filename: f, kind } if f == filename => {
                    Verdict::Fail(rejected(filename, kind))
                }
                _ => Verdict::Discard("reply does not answer this GET"),
            })
            .await;

        match result {
            Ok(data) => {
                tracing::debug!(start = range.start(), len = data.len(), "chunk received");
                Ok(data)
            }
            Err(Failure::Channel(ChannelError::Exhausted { attempts })) => {
                tracing::warn!(
                    state = "ABORTED",
                    offset = session.offset(),
                    size = session.size(),
                    "incomplete transfer"
                );
                Err(DownloadError::Incomplete {
                    received: session.offset(),
                    size: session.size(),
                    attempts,
                })
            }
            Err(Failure::Channel(ChannelError::Io(e))) => Err(DownloadError::Io(e)),
            Err(Failure::Download(e)) => {
                tracing::warn!(state = "ABORTED", error = %e, "transfer aborted");
                Err(e)
            }
        }
    }

    /// AWAIT_CLOSE: returns whether the server confirmed.
    ///
    /// The data is already complete, so a missing or odd confirmation is
    /// only logged.
    async fn close(&self, filename: &str, data_addr: SocketAddr, retransmits: &mut u64) -> bool {
        let request = Request::Close {
            filename: filename.to_string(),
        };
        let result = self
            .request(&request, data_addr, retransmits, |response| match response {
                Response::CloseOk { filename: f } if f == filename => Verdict::Accept(()),
                // Late chunk replies can still be in flight.
                Response::Chunk { .. } => Verdict::Discard("chunk reply while closing"),
                other => Verdict::Fail(DownloadError::Protocol(format!(
                    "unexpected reply to CLOSE: {other}"
                ))),
            })
            .await;

        match result {
            Ok(()) => true,
            Err(Failure::Channel(e)) => {
                tracing::warn!(error = %e, "no CLOSE_OK from server; keeping downloaded file");
                false
            }
            Err(Failure::Download(e)) => {
                tracing::warn!(error = %e, "bad CLOSE confirmation; keeping downloaded file");
                false
            }
        }
    }

    /// Sends `request` until `judge` accepts or rejects a reply.
    ///
    /// A discarded reply does not trigger a resend: the current attempt
    /// keeps waiting until its deadline, so stale replies neither stretch
    /// the budget nor multiply the datagrams in flight.
    async fn request<V>(
        &self,
        request: &Request,
        destination: SocketAddr,
        retransmits: &mut u64,
        judge: impl Fn(Response) -> Verdict<V>,
    ) -> Result<V, Failure> {
        let message = request.to_bytes();

        let (result, attempts) = exchange_until(
            &self.transport,
            &message,
            destination,
            &self.config.retry,
            |Reply { text, from, attempts }| {
                let response = match text.parse::<Response>() {
                    Ok(response) => response,
                    Err(e) => {
                        let err = DownloadError::Protocol(format!("unparseable reply from {from}: {e}"));
                        return Some((Err(err), attempts));
                    }
                };
                match judge(response) {
                    Verdict::Accept(value) => Some((Ok(value), attempts)),
                    Verdict::Fail(e) => Some((Err(e), attempts)),
                    Verdict::Discard(reason) => {
                        tracing::warn!(%from, reason, reply = %truncated(&text), "discarding reply");
                        None
                    }
                }
            },
        )
        .await?;

        *retransmits += u64::from(attempts - 1);
        result.map_err(Failure::Download)
    }
}

/// Why [`Requester::request`] gave up.
enum Failure {
    Channel(ChannelError),
    Download(DownloadError),
}

impl From<ChannelError> for Failure {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

fn rejected(filename: &str, kind: ErrorKind) -> DownloadError {
    let name = filename.to_string();
    match kind {
        ErrorKind::NotFound => DownloadError::NotFound(name),
        ErrorKind::NotAFile => DownloadError::NotAFile(name),
        ErrorKind::ServerFileError => DownloadError::ServerFileError(name),
        ErrorKind::Other(kind) => DownloadError::Protocol(format!("unknown error kind {kind} for {name}")),
    }
}

/// Keeps base64 payloads out of log lines.
fn truncated(text: &str) -> &str {
    const MAX: usize = 80;
    match text.char_indices().nth(MAX) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use udpfetch_channel::{DropPlan, FaultyTransport, RetryPolicy};
    use udpfetch_server::{Dispatcher, PortStrategy, ServerConfig};
    use udpfetch_transfer::checksum_bytes;

    use super::*;

    struct TestServer {
        served: TempDir,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    }

    impl TestServer {
        async fn start(files: &[(&str, Vec<u8>)]) -> Self {
            let served = TempDir::new().unwrap();
            for (name, data) in files {
                std::fs::write(served.path().join(name), data).unwrap();
            }
            let mut config = ServerConfig::new(([127, 0, 0, 1], 0).into(), served.path());
            config.port_strategy = PortStrategy::Ephemeral;
            let dispatcher = Arc::new(Dispatcher::bind(config).await.unwrap());

            let cancel = CancellationToken::new();
            let (d, c) = (Arc::clone(&dispatcher), cancel.clone());
            tokio::spawn(async move { d.run(c).await });

            Self {
                served,
                dispatcher,
                cancel,
            }
        }

        fn addr(&self) -> SocketAddr {
            self.dispatcher.local_addr()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.cancel.cancel();
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            initial_timeout: Duration::from_millis(100),
            max_attempts: 5,
        }
    }

    fn config(server: SocketAddr, out: &TempDir) -> RequesterConfig {
        let mut config = RequesterConfig::new(server, out.path());
        config.retry = fast_retry();
        config
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[tokio::test]
    async fn round_trip_sizes() {
        let sizes = [0usize, 1, 999, 1000, 1001, 2500];
        let files: Vec<(String, Vec<u8>)> = sizes
            .iter()
            .map(|&n| (format!("file_{n}.bin"), pattern(n)))
            .collect();
        let refs: Vec<(&str, Vec<u8>)> = files
            .iter()
            .map(|(n, d)| (n.as_str(), d.clone()))
            .collect();
        let server = TestServer::start(&refs).await;
        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(server.addr(), &out)).await.unwrap();

        for (name, data) in &files {
            let report = requester.download(name).await.unwrap();
            assert_eq!(report.size, data.len() as u64, "{name}");
            assert_eq!(report.bytes_written, data.len() as u64, "{name}");
            assert_eq!(report.chunks, (data.len() as u64).div_ceil(1000), "{name}");
            assert!(report.close_confirmed, "{name}");
            assert_eq!(report.sha256, checksum_bytes(data), "{name}");
            assert_eq!(&std::fs::read(out.path().join(name)).unwrap(), data, "{name}");
        }
    }

    #[tokio::test]
    async fn not_found_aborts_without_output() {
        let server = TestServer::start(&[]).await;
        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(server.addr(), &out)).await.unwrap();

        let err = requester.download("ghost.txt").await.unwrap_err();
        assert!(matches!(err, DownloadError::NotFound(ref n) if n == "ghost.txt"));
        assert_eq!(err.outcome(), Outcome::Aborted);
        assert!(!out.path().join("ghost.txt").exists());
        assert_eq!(server.dispatcher.active_transfers(), 0);
    }

    #[tokio::test]
    async fn invalid_name_never_leaves_the_client() {
        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config("127.0.0.1:9".parse().unwrap(), &out))
            .await
            .unwrap();
        let err = requester.download("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidName(_)));
    }

    #[tokio::test]
    async fn silent_server_is_unreachable() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let out = TempDir::new().unwrap();
        let mut cfg = config(silent.local_addr().unwrap(), &out);
        cfg.retry = RetryPolicy {
            initial_timeout: Duration::from_millis(20),
            max_attempts: 3,
        };
        let requester = Requester::bind(cfg).await.unwrap();

        let err = requester.download("a.txt").await.unwrap_err();
        assert!(matches!(err, DownloadError::Unreachable { attempts: 3 }));
        assert_eq!(err.outcome(), Outcome::Aborted);
    }

    #[tokio::test]
    async fn concurrent_sessions_are_independent() {
        let a = pattern(2500);
        let b: Vec<u8> = pattern(1700).into_iter().rev().collect();
        let server = TestServer::start(&[("a.bin", a.clone()), ("b.bin", b.clone())]).await;

        let out1 = TempDir::new().unwrap();
        let out2 = TempDir::new().unwrap();
        let out3 = TempDir::new().unwrap();
        let r1 = Requester::bind(config(server.addr(), &out1)).await.unwrap();
        let r2 = Requester::bind(config(server.addr(), &out2)).await.unwrap();
        let r3 = Requester::bind(config(server.addr(), &out3)).await.unwrap();

        let (x, y, z) = tokio::join!(r1.download("a.bin"), r2.download("b.bin"), r3.download("a.bin"));
        let (x, y, z) = (x.unwrap(), y.unwrap(), z.unwrap());

        assert_eq!(std::fs::read(out1.path().join("a.bin")).unwrap(), a);
        assert_eq!(std::fs::read(out2.path().join("b.bin")).unwrap(), b);
        assert_eq!(std::fs::read(out3.path().join("a.bin")).unwrap(), a);
        assert_eq!(x.sha256, z.sha256);
        assert_ne!(x.sha256, y.sha256);
    }

    #[tokio::test]
    async fn lossy_link_still_delivers() {
        let data = pattern(4321);
        let server = TestServer::start(&[("lossy.bin", data.clone())]).await;
        let out = TempDir::new().unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let plan = DropPlan {
            drop_first: 1,
            drop_every: Some(3),
        };
        let mut cfg = config(server.addr(), &out);
        cfg.retry = RetryPolicy {
            initial_timeout: Duration::from_millis(50),
            max_attempts: 5,
        };
        let requester = Requester::with_transport(FaultyTransport::new(socket, plan), cfg);

        let report = requester.download("lossy.bin").await.unwrap();
        assert_eq!(std::fs::read(out.path().join("lossy.bin")).unwrap(), data);
        assert!(requester.transport().dropped() > 0);
        assert!(report.retransmits >= requester.transport().dropped());
    }

    #[tokio::test]
    async fn batch_continues_past_failures() {
        let server = TestServer::start(&[("one.txt", b"first".to_vec()), ("two.txt", b"second".to_vec())]).await;
        std::fs::create_dir(server.served.path().join("dir")).unwrap();
        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(server.addr(), &out)).await.unwrap();

        let report = requester
            .download_batch(["one.txt", "missing.txt", "dir", "two.txt"])
            .await;

        let outcomes: Vec<Outcome> = report.entries.iter().map(BatchEntry::outcome).collect();
        assert_eq!(
            outcomes,
            [Outcome::Success, Outcome::Aborted, Outcome::Aborted, Outcome::Success]
        );
        assert!(matches!(report.entries[2].result, Err(DownloadError::NotAFile(_))));
        assert_eq!(report.bytes_written(), 11);
        assert!(!report.all_succeeded());
        assert_eq!(std::fs::read(out.path().join("two.txt")).unwrap(), b"second");
    }

    // -----------------------------------------------------------------------
    // Scripted peers
    // -----------------------------------------------------------------------

    async fn next_request(socket: &UdpSocket) -> (String, SocketAddr) {
        let mut buf = vec![0u8; 4096];
        let (n, from) = socket.recv_from(&mut buf).await.unwrap();
        (String::from_utf8_lossy(&buf[..n]).into_owned(), from)
    }

    #[tokio::test]
    async fn stale_chunk_is_discarded_and_request_repeated() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let script = tokio::spawn(async move {
            let (req, client) = next_request(&peer).await;
            assert_eq!(req, "DOWNLOAD s.txt");
            let ok = format!("OK s.txt SIZE 4 PORT {}", addr.port());
            peer.send_to(ok.as_bytes(), client).await.unwrap();

            let (req, _) = next_request(&peer).await;
            assert_eq!(req, "FILE s.txt GET START 0 END 3");
            let first_get = std::time::Instant::now();
            // Wrong offset: must be ignored.
            let stale = format!("FILE s.txt OK START 2 END 3 DATA {}", STANDARD.encode(b"zz"));
            peer.send_to(stale.as_bytes(), client).await.unwrap();

            let (req, _) = next_request(&peer).await;
            assert_eq!(req, "FILE s.txt GET START 0 END 3");
            // The repeat waits for the attempt window instead of chasing the stale reply.
            assert!(first_get.elapsed() >= Duration::from_millis(80));
            let good = format!("FILE s.txt OK START 0 END 3 DATA {}", STANDARD.encode(b"abcd"));
            peer.send_to(good.as_bytes(), client).await.unwrap();

            let (req, _) = next_request(&peer).await;
            assert_eq!(req, "FILE s.txt CLOSE");
            peer.send_to(b"FILE s.txt CLOSE_OK", client).await.unwrap();
        });

        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(addr, &out)).await.unwrap();
        let report = requester.download("s.txt").await.unwrap();
        script.await.unwrap();

        assert_eq!(std::fs::read(out.path().join("s.txt")).unwrap(), b"abcd");
        assert_eq!(report.retransmits, 1);
        assert!(report.close_confirmed);
    }

    #[tokio::test]
    async fn error_reply_to_get_aborts() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let script = tokio::spawn(async move {
            let (_, client) = next_request(&peer).await;
            let ok = format!("OK gone.bin SIZE 3000 PORT {}", addr.port());
            peer.send_to(ok.as_bytes(), client).await.unwrap();

            let (req, _) = next_request(&peer).await;
            assert_eq!(req, "FILE gone.bin GET START 0 END 999");
            peer.send_to(b"ERR gone.bin NOT_FOUND", client).await.unwrap();
        });

        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(addr, &out)).await.unwrap();
        let err = requester.download("gone.bin").await.unwrap_err();
        script.await.unwrap();

        assert!(matches!(err, DownloadError::NotFound(ref n) if n == "gone.bin"));
        assert_eq!(err.outcome(), Outcome::Aborted);
    }

    #[tokio::test]
    async fn garbage_reply_is_a_protocol_violation() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let script = tokio::spawn(async move {
            let (_, client) = next_request(&peer).await;
            peer.send_to(b"HELLO world", client).await.unwrap();
        });

        let out = TempDir::new().unwrap();
        let requester = Requester::bind(config(addr, &out)).await.unwrap();
        let err = requester.download("x.txt").await.unwrap_err();
        script.await.unwrap();
        assert!(matches!(err, DownloadError::Protocol(_)));
        assert_eq!(err.outcome(), Outcome::Aborted);
    }

    #[tokio::test]
    async fn silent_data_port_is_incomplete() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mute = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let mute_port = mute.local_addr().unwrap().port();
        let script = tokio::spawn(async move {
            let (_, client) = next_request(&peer).await;
            let ok = format!("OK big.bin SIZE 5000 PORT {mute_port}");
            peer.send_to(ok.as_bytes(), client).await.unwrap();
            // Keep the data socket open but never answer.
            mute
        });

        let out = TempDir::new().unwrap();
        let mut cfg = config(addr, &out);
        cfg.retry = RetryPolicy {
            initial_timeout: Duration::from_millis(20),
            max_attempts: 3,
        };
        let requester = Requester::bind(cfg).await.unwrap();
        let err = requester.download("big.bin").await.unwrap_err();
        let _mute = script.await.unwrap();

        assert!(matches!(
            err,
            DownloadError::Incomplete {
                received: 0,
                size: 5000,
                attempts: 3
            }
        ));
        assert_eq!(err.outcome(), Outcome::Incomplete);
    }

    #[tokio::test]
    async fn missing_close_ok_still_succeeds() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let script = tokio::spawn(async move {
            let (_, client) = next_request(&peer).await;
            let ok = format!("OK e.txt SIZE 0 PORT {}", addr.port());
            peer.send_to(ok.as_bytes(), client).await.unwrap();
            // CLOSE requests go unanswered.
            for _ in 0..2 {
                let (req, _) = next_request(&peer).await;
                assert_eq!(req, "FILE e.txt CLOSE");
            }
        });

        let out = TempDir::new().unwrap();
        let mut cfg = config(addr, &out);
        cfg.retry = RetryPolicy {
            initial_timeout: Duration::from_millis(20),
            max_attempts: 2,
        };
        let requester = Requester::bind(cfg).await.unwrap();
        let report = requester.download("e.txt").await.unwrap();
        script.await.unwrap();

        assert!(!report.close_confirmed);
        assert_eq!(report.bytes_written, 0);
        assert!(std::fs::read(out.path().join("e.txt")).unwrap().is_empty());
    }

    #[test]
    fn truncated_keeps_short_text() {
        assert_eq!(truncated("OK a SIZE 1 PORT 2"), "OK a SIZE 1 PORT 2");
        assert_eq!(truncated(&"x".repeat(200)).len(), 80);
    }
}
