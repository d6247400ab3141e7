//! Client side of udpfetch.
//!
//! A [`Requester`] downloads files one at a time: `DOWNLOAD` on the
//! server's control port, then stop-and-wait chunk requests against the
//! data port the server hands back, then `CLOSE`.

mod error;
mod file_list;
mod requester;

use std::net::SocketAddr;
use std::path::PathBuf;

use udpfetch_channel::RetryPolicy;
use udpfetch_protocol::constants::MAX_CHUNK_SIZE;

pub use error::DownloadError;
pub use file_list::read_file_list;
pub use requester::{BatchEntry, BatchReport, DownloadReport, Requester};

/// Requester configuration.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Server control address.
    pub server_addr: SocketAddr,
    /// Directory downloads are written into.
    pub output_dir: PathBuf,
    /// Timeout and attempt budget for every exchange.
    pub retry: RetryPolicy,
    /// Largest range asked for in one chunk request.
    pub max_chunk: u64,
}

impl RequesterConfig {
    pub fn new(server_addr: SocketAddr, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_addr,
            output_dir: output_dir.into(),
            retry: RetryPolicy::default(),
            max_chunk: MAX_CHUNK_SIZE,
        }
    }
}
