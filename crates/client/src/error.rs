use udpfetch_channel::ChannelError;
use udpfetch_transfer::{Outcome, TransferError};

/// Why a single file's download stopped early.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("server unreachable: no reply after {attempts} attempts")]
    Unreachable { attempts: u32 },

    #[error("not found on server: {0}")]
    NotFound(String),

    #[error("not a regular file on server: {0}")]
    NotAFile(String),

    #[error("server could not read file: {0}")]
    ServerFileError(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("incomplete transfer: {received} of {size} bytes after {attempts} attempts")]
    Incomplete {
        received: u64,
        size: u64,
        attempts: u32,
    },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local file error: {0}")]
    Local(TransferError),
}

impl DownloadError {
    /// Terminal outcome reported for a download that failed this way.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Incomplete { .. } => Outcome::Incomplete,
            _ => Outcome::Aborted,
        }
    }
}

impl From<TransferError> for DownloadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => Self::Io(e),
            TransferError::InvalidName(name) => Self::InvalidName(name),
            other => Self::Local(other),
        }
    }
}

/// Maps a failed handshake exchange.
pub(crate) fn handshake_failure(e: ChannelError) -> DownloadError {
    match e {
        ChannelError::Exhausted { attempts } => DownloadError::Unreachable { attempts },
        ChannelError::Io(e) => DownloadError::Io(e),
    }
}
