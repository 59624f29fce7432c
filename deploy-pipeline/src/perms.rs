//! Group ownership for published files.
//!
//! Everything under the web root is shared by the owning group: files get
//! the group and `g+w`; directories additionally get `g+s` so files created
//! later inherit the group.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use deploy_core::OwnerGroup;

use crate::error::{io_err, PublishError};

/// `g+w`
pub const GROUP_WRITE: u32 = 0o020;
/// `g+s`
pub const SET_GID: u32 = 0o2000;

/// Apply group + `g+w` to one path (no recursion, no `g+s`).
pub fn share_file(path: &Path, group: &OwnerGroup) -> Result<(), PublishError> {
    apply(path, group, false)
}

/// Apply group + `g+w` to `root` and everything below it, plus `g+s` on
/// directories. Symlinks are left alone.
pub fn share_tree(root: &Path, group: &OwnerGroup) -> Result<(), PublishError> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        if entry.file_type().is_symlink() {
            continue;
        }
        apply(entry.path(), group, entry.file_type().is_dir())?;
    }
    Ok(())
}

#[cfg(unix)]
fn apply(path: &Path, group: &OwnerGroup, is_dir: bool) -> Result<(), PublishError> {
    use std::os::unix::fs::PermissionsExt;

    std::os::unix::fs::chown(path, None, Some(group.gid)).map_err(|e| io_err(path, e))?;

    let meta = fs::metadata(path).map_err(|e| io_err(path, e))?;
    let mut mode = meta.permissions().mode() | GROUP_WRITE;
    if is_dir {
        mode |= SET_GID;
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn apply(path: &Path, _group: &OwnerGroup, _is_dir: bool) -> Result<(), PublishError> {
    fs::metadata(path).map(|_| ()).map_err(|e| io_err(path, e))
}
