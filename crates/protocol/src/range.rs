//! Inclusive byte ranges addressed by chunk requests.

use crate::ProtocolError;

/// A contiguous byte range `[start, end]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    start: u64,
    end: u64,
}

impl ChunkRange {
    /// Builds a range, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self, ProtocolError> {
        if start > end {
            return Err(ProtocolError::ReversedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns the range the requester should ask for next.
    ///
    /// `None` once `offset` has reached `size`. A zero `max_chunk` is
    /// treated as one byte.
    pub fn next(offset: u64, size: u64, max_chunk: u64) -> Option<Self> {
        if offset >= size {
            return None;
        }
        let span = max_chunk.max(1) - 1;
        let end = offset.saturating_add(span).min(size - 1);
        Some(Self { start: offset, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if the whole range lies inside a file of `size` bytes.
    pub fn fits_within(&self, size: u64) -> bool {
        self.end < size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_range_rejected() {
        assert!(matches!(
            ChunkRange::new(10, 9),
            Err(ProtocolError::ReversedRange { start: 10, end: 9 })
        ));
    }

    #[test]
    fn single_byte_range() {
        let r = ChunkRange::new(7, 7).unwrap();
        assert_eq!(r.len(), 1);
        assert!(r.fits_within(8));
        assert!(!r.fits_within(7));
    }

    #[test]
    fn next_for_empty_file() {
        assert_eq!(ChunkRange::next(0, 0, 1000), None);
    }

    #[test]
    fn next_walks_a_file_with_short_tail() {
        let size = 2500;
        let mut offset = 0;
        let mut ranges = Vec::new();
        while let Some(r) = ChunkRange::next(offset, size, 1000) {
            ranges.push((r.start(), r.end()));
            offset += r.len();
        }
        assert_eq!(ranges, vec![(0, 999), (1000, 1999), (2000, 2499)]);
        assert_eq!(offset, size);
    }

    #[test]
    fn next_on_exact_boundary() {
        let r = ChunkRange::next(0, 1000, 1000).unwrap();
        assert_eq!((r.start(), r.end()), (0, 999));
        assert_eq!(ChunkRange::next(1000, 1000, 1000), None);

        let tail = ChunkRange::next(1000, 1001, 1000).unwrap();
        assert_eq!((tail.start(), tail.end()), (1000, 1000));
    }

    #[test]
    fn next_with_zero_chunk_size_still_progresses() {
        let r = ChunkRange::next(3, 10, 0).unwrap();
        assert_eq!(r.len(), 1);
    }
}
