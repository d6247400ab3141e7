//! Wire protocol for udpfetch.
//!
//! Every message is a single datagram of space-separated ASCII tokens.
//! Data-bearing replies end with a base64 payload that is located by its
//! position after a fixed head, never by splitting on all whitespace.

pub mod constants;
pub mod messages;
pub mod range;

pub use messages::{ErrorKind, Request, Response};
pub use range::ChunkRange;

/// Errors produced while parsing wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,

    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("reversed byte range: start {start} > end {end}")]
    ReversedRange { start: u64, end: u64 },

    #[error("invalid payload encoding: {0}")]
    Payload(#[from] base64::DecodeError),
}
