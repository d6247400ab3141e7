//! File-side plumbing for udpfetch transfers.
//!
//! The server reads byte ranges out of a served directory; the client
//! writes them at their offsets into an output directory and tracks how
//! far the session has progressed.

mod chunked;
mod progress;
mod served;
mod session;
mod validation;

pub use chunked::{ChunkReader, OutputFile, checksum_bytes, file_checksum};
pub use progress::{ProgressMeter, SpeedCalculator};
pub use served::{ServedDir, ServedFile};
pub use session::{Outcome, TransferSession};
pub use validation::validate_file_name;

pub use udpfetch_protocol::constants::MAX_CHUNK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("chunk starts at {got}, expected {expected}")]
    OffsetMismatch { expected: u64, got: u64 },

    #[error("chunk of {len} bytes at {offset} overruns file size {size}")]
    Overrun { offset: u64, len: u64, size: u64 },

    #[error("empty chunk payload at offset {0}")]
    EmptyChunk(u64),
}
