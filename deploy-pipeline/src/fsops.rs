//! Moves that survive crossing filesystems.
//!
//! The work directory usually lives under the system temp dir while the web
//! root is on another mount, where `rename(2)` fails with `EXDEV`. Every move
//! tries a rename first and falls back to copy + delete.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{io_err, PublishError};

/// Move a file or directory tree to `dst`, replacing a file at `dst`.
pub fn move_path(src: &Path, dst: &Path) -> Result<(), PublishError> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(
                "rename {} -> {} failed ({err}), copying",
                src.display(),
                dst.display()
            );
            copy_tree(src, dst)?;
            remove_path(src)
        }
    }
}

/// Recursively copy `src` to `dst`. Symlinks are recreated, not followed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), PublishError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            io_err(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io_err(entry.path(), std::io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| io_err(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), PublishError> {
    let link = fs::read_link(src).map_err(|e| io_err(src, e))?;
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst).map_err(|e| io_err(dst, e))?;
    }
    std::os::unix::fs::symlink(link, dst).map_err(|e| io_err(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), PublishError> {
    fs::copy(src, dst).map(|_| ()).map_err(|e| io_err(dst, e))
}

/// Remove a file or a directory tree; missing paths are fine.
pub fn remove_path(path: &Path) -> Result<(), PublishError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_err(path, err)),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| io_err(path, e))
    } else {
        fs::remove_file(path).map_err(|e| io_err(path, e))
    }
}
