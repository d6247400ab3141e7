use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use udpfetch_protocol::ChunkRange;

use crate::{TransferError, validate_file_name};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub async fn file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Serves arbitrary byte ranges of one file.
///
/// Reads are positional and carry no state between calls, so the same range
/// can be served any number of times in any order.
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
}

impl ChunkReader {
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        Ok(Self { file })
    }

    /// Reads the bytes covered by `range`.
    ///
    /// Returns fewer bytes than `range.len()` only if the file has shrunk
    /// since it was opened.
    pub async fn read_range(&mut self, range: ChunkRange) -> Result<Vec<u8>, TransferError> {
        self.file.seek(SeekFrom::Start(range.start())).await?;

        let len = range.len() as usize;
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// OutputFile
// ---------------------------------------------------------------------------

/// Local destination of a download, written at exact offsets.
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    path: PathBuf,
    high_water: u64,
}

impl OutputFile {
    /// Creates (or truncates) `name` inside `dir`.
    ///
    /// Intermediate directories are created as needed.
    pub async fn create(dir: &Path, name: &str) -> Result<Self, TransferError> {
        validate_file_name(name)?;
        let path = dir.join(name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = File::create(&path).await?;
        Ok(Self {
            file,
            path,
            high_water: 0,
        })
    }

    /// Writes `data` starting at byte `offset`.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), TransferError> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        self.high_water = self.high_water.max(offset + data.len() as u64);
        Ok(())
    }

    /// Highest byte offset written so far (exclusive).
    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered writes to disk and returns the file's path.
    pub async fn finish(mut self) -> Result<PathBuf, TransferError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.path)
    }
}
