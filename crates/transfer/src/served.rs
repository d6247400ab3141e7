//! Read-only access to the directory a server exposes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::chunked::ChunkReader;
use crate::{TransferError, validate_file_name};

/// A file found in the served directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    /// Name exactly as requested on the wire.
    pub name: String,
    /// Resolved location on disk.
    pub path: PathBuf,
    /// Size in bytes at lookup time.
    pub size: u64,
}

/// Directory whose regular files may be downloaded.
///
/// Shared read-only by every transfer worker.
#[derive(Debug, Clone)]
pub struct ServedDir {
    root: PathBuf,
}

impl ServedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `name` to a regular file inside the served directory.
    ///
    /// Names that fail validation report [`TransferError::InvalidName`] and
    /// are never joined onto the root.
    pub async fn lookup(&self, name: &str) -> Result<ServedFile, TransferError> {
        validate_file_name(name)?;
        let path = self.root.join(name);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TransferError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(TransferError::NotAFile(name.to_string()));
        }

        Ok(ServedFile {
            name: name.to_string(),
            path,
            size: metadata.len(),
        })
    }

    /// Returns `true` if `name` resolves to a regular file.
    pub async fn exists(&self, name: &str) -> bool {
        self.lookup(name).await.is_ok()
    }

    /// Opens a previously looked-up file for ranged reads.
    pub async fn open(&self, file: &ServedFile) -> Result<ChunkReader, TransferError> {
        match ChunkReader::open(&file.path).await {
            Err(TransferError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(TransferError::NotFound(file.name.clone()))
            }
            other => other,
        }
    }
}
