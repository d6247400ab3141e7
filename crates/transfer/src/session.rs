use udpfetch_protocol::ChunkRange;

use crate::TransferError;

/// Terminal outcome of one file's transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every byte arrived and was written.
    Success,
    /// The retry budget ran out partway through the data.
    Incomplete,
    /// The session ended on an error reply, a protocol violation, or a
    /// local failure.
    Aborted,
}

/// Requester-side state of one file transfer.
///
/// The offset only moves forward, and only by the number of bytes actually
/// accepted, so it never passes `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    filename: String,
    size: u64,
    data_port: u16,
    offset: u64,
    chunks: u64,
}

impl TransferSession {
    pub fn new(filename: impl Into<String>, size: u64, data_port: u16) -> Self {
        Self {
            filename: filename.into(),
            size,
            data_port,
            offset: 0,
            chunks: 0,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn data_port(&self) -> u16 {
        self.data_port
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Chunks accepted so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn remaining(&self) -> u64 {
        self.size - self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.size
    }

    /// Range to request next, or `None` once the whole file has arrived.
    pub fn next_range(&self, max_chunk: u64) -> Option<ChunkRange> {
        ChunkRange::next(self.offset, self.size, max_chunk)
    }

    /// Accepts `payload_len` bytes that a reply placed at `start`.
    ///
    /// The reply must start at the current offset, carry at least one byte,
    /// and stay inside the file. On success the offset advances by exactly
    /// `payload_len`.
    pub fn accept(&mut self, start: u64, payload_len: u64) -> Result<(), TransferError> {
        if start != self.offset {
            return Err(TransferError::OffsetMismatch {
                expected: self.offset,
                got: start,
            });
        }
        if payload_len == 0 {
            return Err(TransferError::EmptyChunk(start));
        }
        if payload_len > self.remaining() {
            return Err(TransferError::Overrun {
                offset: start,
                len: payload_len,
                size: self.size,
            });
        }
        self.offset += payload_len;
        self.chunks += 1;
        Ok(())
    }
}
