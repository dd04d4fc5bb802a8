//! Filesystem helpers shared by the pipeline and key file code
//!
//! Final outputs are never written in place: the contents go to a temporary
//! file in the destination directory, which is fsynced, restricted to mode
//! 0o600 on Unix, and then renamed over the target. Either the old file or
//! the complete new file exists afterwards, never a partial one. The
//! temporary file is removed on every error path when it is dropped.

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read a whole file, attributing a missing file to the user.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SealError::io(format!("failed to read from {}", path.display()), e))
}

/// Atomically replace `path` with `contents`, owner read/write only.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".sealpack-tmp")
        .tempfile_in(dir)
        .map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to create tempfile in {}", dir.display()),
                e,
            )
        })?;

    temp_file.write_all(contents).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                SealError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}
