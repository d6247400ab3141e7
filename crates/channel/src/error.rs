//! Error types for the datagram channel.

/// Errors produced by the datagram channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply after {attempts} attempts")]
    Exhausted { attempts: u32 },
}
