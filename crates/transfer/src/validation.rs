use std::path::{Component, Path};

use crate::TransferError;

/// Validates a requested file name.
///
/// The name travels as a single wire token and is resolved relative to a
/// served or output directory, so it must not escape that directory.
///
/// Rejects:
/// - Empty names
/// - Names containing whitespace or control characters
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(TransferError::InvalidName(format!(
            "whitespace not allowed: {name:?}"
        )));
    }

    let path = Path::new(name);

    if path.is_absolute() {
        return Err(TransferError::InvalidName(format!(
            "absolute path not allowed: {name}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidName(format!(
                    "parent directory traversal not allowed: {name}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidName(format!(
                    "absolute path not allowed: {name}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
