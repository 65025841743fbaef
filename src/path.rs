//! Path composition and validation rules shared by the file helpers.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Result, StorageError};

/// Maximum length in bytes of a single path component.
pub const MAX_COMPONENT_LEN: usize = 255;

/// Rejects empty paths and paths with any `/`-separated component longer
/// than [`MAX_COMPONENT_LEN`] bytes. Every file helper runs this before
/// touching the OS so the limit holds uniformly across filesystems.
pub fn check_path_length(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(StorageError::InvalidArgument);
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_COMPONENT_LEN {
            return Err(StorageError::FileNameTooLong);
        }
    }
    Ok(())
}

/// Joins slash-separated path elements, skipping empty ones.
///
/// Used for bucket-relative paths handed to [`crate::storage::StorageAPI`],
/// which always speak `/` regardless of the host OS.
pub fn path_join(elements: &[&str]) -> String {
    let mut joined = String::new();
    for element in elements {
        if element.is_empty() {
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(element.trim_start_matches('/'));
    }
    joined
}

/// Leases a unique leaf under `tmp_root` for quarantine renames.
pub fn temp_path(tmp_root: &Path) -> PathBuf {
    tmp_root.join(Uuid::new_v4().to_string())
}
