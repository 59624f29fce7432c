//! Atomic in-place rewrites.
//!
//! ## `rewrite_file`: 5-step protocol
//!
//! 1. Read the current content.
//! 2. Transform it (caller-supplied).
//! 3. Compare → skip if identical.
//! 4. Write to `<path>.deploy.tmp`.
//! 5. Rename to final path (atomic on POSIX).

use std::path::{Path, PathBuf};

use crate::error::{io_err, PublishError};

/// Outcome of an individual file rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content changed and was written.
    Rewritten { path: PathBuf },
    /// Transform produced identical content; file untouched.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn changed(&self) -> bool {
        matches!(self, WriteResult::Rewritten { .. })
    }
}

/// Rewrite `path` through `transform`, writing only if the content changes.
pub fn rewrite_file<F>(path: &Path, transform: F) -> Result<WriteResult, PublishError>
where
    F: FnOnce(&str) -> String,
{
    let tmp = PathBuf::from(format!("{}.deploy.tmp", path.display()));
    rewrite_file_with_tmp(path, transform, &tmp)
}

fn rewrite_file_with_tmp<F>(path: &Path, transform: F, tmp: &Path) -> Result<WriteResult, PublishError>
where
    F: FnOnce(&str) -> String,
{
    let current = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let updated = transform(&current);

    if updated == current {
        tracing::trace!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    std::fs::write(tmp, &updated).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::trace!("rewrote: {}", path.display());
    Ok(WriteResult::Rewritten {
        path: path.to_path_buf(),
    })
}

/// Write `content` to `path` atomically, unconditionally.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PublishError> {
    let tmp = PathBuf::from(format!("{}.deploy.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
