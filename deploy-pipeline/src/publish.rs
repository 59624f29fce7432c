//! Staged replacement of the live web directory.
//!
//! ## `replace_web_dir` protocol
//!
//! 1. Clear leftovers of a crashed run (`.<name>.staging`, `.<name>.previous`).
//! 2. Stage `downloads/` and the contents of `src/epub/` (minus `onix.xml`)
//!    into `.<name>.staging`, a sibling of the target.
//! 3. Rename the live target to `.<name>.previous`.
//! 4. Rename staging to the target; on failure rename previous back.
//! 5. Delete `.<name>.previous`.
//!
//! Readers see either the old tree or the new tree, never a half-built one,
//! and a failure before step 4 leaves the old tree in place.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use deploy_core::layout::DOWNLOADS_DIR;

use crate::error::{io_err, PublishError};
use crate::fsops;

/// Retailer metadata the web never serves.
pub const EXCLUDED_FILES: &[&str] = &["onix.xml"];

/// `<parent>/.<name>.<suffix>`
pub fn sibling(target: &Path, suffix: &str) -> Result<PathBuf, PublishError> {
    let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
        return Err(io_err(
            target,
            std::io::Error::other("target has no parent directory"),
        ));
    };
    let mut sibling = OsString::from(".");
    sibling.push(name);
    sibling.push(".");
    sibling.push(suffix);
    Ok(parent.join(sibling))
}

fn stage(work_dir: &Path, staging: &Path) -> Result<usize, PublishError> {
    fs::create_dir_all(staging).map_err(|e| io_err(staging, e))?;

    let downloads = work_dir.join(DOWNLOADS_DIR);
    fsops::move_path(&downloads, &staging.join(DOWNLOADS_DIR))?;
    let mut staged = 1;

    let epub_dir = work_dir.join("src").join("epub");
    let entries = fs::read_dir(&epub_dir).map_err(|e| io_err(&epub_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&epub_dir, e))?;
        let name = entry.file_name();
        if EXCLUDED_FILES.iter().any(|excluded| name == *excluded) {
            continue;
        }
        fsops::move_path(&entry.path(), &staging.join(&name))?;
        staged += 1;
    }
    Ok(staged)
}

/// Replace `target` with the built tree in `work_dir`.
///
/// Returns the number of top-level entries published.
pub fn replace_web_dir(work_dir: &Path, target: &Path) -> Result<usize, PublishError> {
    let staging = sibling(target, "staging")?;
    let previous = sibling(target, "previous")?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fsops::remove_path(&staging)?;
    fsops::remove_path(&previous)?;

    let staged = match stage(work_dir, &staging) {
        Ok(count) => count,
        Err(err) => {
            let _ = fsops::remove_path(&staging);
            return Err(err);
        }
    };

    swap_in(&staging, target, &previous)?;
    Ok(staged)
}

/// Rename `staging` over `target`, parking the live tree at `previous`.
/// `staging` never outlives a failed swap.
fn swap_in(staging: &Path, target: &Path, previous: &Path) -> Result<(), PublishError> {
    let had_previous = target.exists();
    if had_previous {
        if let Err(err) = fs::rename(target, previous) {
            let _ = fsops::remove_path(staging);
            return Err(io_err(target, err));
        }
    }

    if let Err(err) = fs::rename(staging, target) {
        if had_previous {
            if let Err(restore) = fs::rename(previous, target) {
                tracing::error!(
                    "could not restore {} from {}: {restore}",
                    target.display(),
                    previous.display()
                );
            }
        }
        let _ = fsops::remove_path(staging);
        return Err(io_err(target, err));
    }

    if had_previous {
        if let Err(err) = fsops::remove_path(previous) {
            tracing::warn!("leaving stale {}: {err}", previous.display());
        }
    }
    Ok(())
}

/// Move generated renditions into the covers directory, replacing old ones.
pub fn publish_covers(files: &[PathBuf], covers_dir: &Path) -> Result<Vec<PathBuf>, PublishError> {
    fs::create_dir_all(covers_dir).map_err(|e| io_err(covers_dir, e))?;
    let mut published = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let destination = covers_dir.join(name);
        fsops::move_path(file, &destination)?;
        published.push(destination);
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn built_tree(root: &Path) -> PathBuf {
        let work = root.join("work");
        fs::create_dir_all(work.join("downloads")).unwrap();
        fs::create_dir_all(work.join("src/epub/text")).unwrap();
        fs::write(work.join("downloads/emma.epub"), "epub").unwrap();
        fs::write(work.join("src/epub/text/chapter-1.xhtml"), "new").unwrap();
        fs::write(work.join("src/epub/onix.xml"), "onix").unwrap();
        fs::write(work.join("src/epub/content.opf"), "opf").unwrap();
        work
    }

    #[test]
    fn sibling_names_are_hidden() {
        let s = sibling(Path::new("/web/www/ebooks/jane-austen/emma"), "staging").unwrap();
        assert_eq!(s, Path::new("/web/www/ebooks/jane-austen/.emma.staging"));
    }

    #[test]
    fn replaces_old_tree_wholesale() {
        let tmp = TempDir::new().unwrap();
        let work = built_tree(tmp.path());
        let target = tmp.path().join("www/ebooks/emma");
        fs::create_dir_all(target.join("text")).unwrap();
        fs::write(target.join("text/removed-chapter.xhtml"), "old").unwrap();

        replace_web_dir(&work, &target).unwrap();

        assert!(target.join("downloads/emma.epub").is_file());
        assert!(target.join("content.opf").is_file());
        assert!(!target.join("onix.xml").exists());
        assert!(!target.join("text/removed-chapter.xhtml").exists());
        assert_eq!(
            fs::read_to_string(target.join("text/chapter-1.xhtml")).unwrap(),
            "new"
        );
        assert!(!sibling(&target, "staging").unwrap().exists());
        assert!(!sibling(&target, "previous").unwrap().exists());
    }

    #[test]
    fn failed_staging_keeps_live_tree() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let target = tmp.path().join("www/ebooks/emma");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("keep.xhtml"), "old").unwrap();

        assert!(replace_web_dir(&work, &target).is_err());

        assert_eq!(fs::read_to_string(target.join("keep.xhtml")).unwrap(), "old");
        assert!(!sibling(&target, "staging").unwrap().exists());
    }

    #[test]
    fn failed_parking_of_live_tree_removes_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join(".emma.staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new.xhtml"), "new").unwrap();
        let target = tmp.path().join("emma");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("keep.xhtml"), "old").unwrap();
        let unreachable = tmp.path().join("no-such-dir/.emma.previous");

        let err = swap_in(&staging, &target, &unreachable).unwrap_err();

        assert!(matches!(err, PublishError::Io { .. }), "got: {err}");
        assert!(!staging.exists());
        assert_eq!(fs::read_to_string(target.join("keep.xhtml")).unwrap(), "old");
    }

    #[test]
    fn covers_replace_existing_files() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let covers = tmp.path().join("covers");
        fs::create_dir_all(&scratch).unwrap();
        fs::create_dir_all(&covers).unwrap();
        fs::write(covers.join("emma-cover.jpg"), "old").unwrap();
        let file = scratch.join("emma-cover.jpg");
        fs::write(&file, "new").unwrap();

        let published = publish_covers(&[file], &covers).unwrap();

        assert_eq!(published, vec![covers.join("emma-cover.jpg")]);
        assert_eq!(fs::read_to_string(covers.join("emma-cover.jpg")).unwrap(), "new");
    }
}
