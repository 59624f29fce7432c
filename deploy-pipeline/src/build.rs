//! Clone, build, validate and recompose in a work directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use deploy_core::layout::DOWNLOADS_DIR;
use deploy_core::metadata::{self, CONTENT_OPF_PATH};
use deploy_core::WebLayout;
use deploy_tools::{BuildRequest, RecomposeRequest, Toolchain};

use crate::error::{io_err, PublishError};
use crate::rewrite::SINGLE_PAGE_FILE;
use crate::writer;

/// Parse `git log --format=%cI` output into UTC.
pub fn parse_commit_date(raw: &str) -> Result<DateTime<Utc>, PublishError> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|source| PublishError::CommitDate {
            date: trimmed.to_string(),
            source,
        })
}

/// Clone `repo` into `work_dir`, build into `<work_dir>/downloads` and stamp
/// the clone's modified date with the last commit date.
pub fn build_ebook(
    toolchain: &dyn Toolchain,
    repo: &Path,
    work_dir: &Path,
    check: bool,
) -> Result<(), PublishError> {
    toolchain.git_clone(repo, work_dir)?;

    let downloads = work_dir.join(DOWNLOADS_DIR);
    fs::create_dir_all(&downloads).map_err(|e| io_err(&downloads, e))?;

    toolchain.build_ebook(&BuildRequest {
        source_dir: work_dir,
        output_dir: &downloads,
        check,
    })?;

    let modified = parse_commit_date(&toolchain.git_last_commit_date(repo)?)?;
    let opf_path = work_dir.join(CONTENT_OPF_PATH);
    let opf = fs::read_to_string(&opf_path).map_err(|e| io_err(&opf_path, e))?;
    let stamped = metadata::rewrite_modified(&opf, modified)?;
    writer::write_atomic(&opf_path, stamped.as_bytes())?;

    tracing::debug!(
        "built {} (modified {})",
        work_dir.display(),
        modified.format(metadata::MODIFIED_FORMAT)
    );
    Ok(())
}

/// Recompose the built tree into `<work_dir>/single-page.xhtml`.
///
/// The output stays outside `src/epub` until the content rewrites are done.
pub fn recompose(
    toolchain: &dyn Toolchain,
    work_dir: &Path,
    layout: &WebLayout,
) -> Result<PathBuf, PublishError> {
    let output = work_dir.join(SINGLE_PAGE_FILE);
    let extra_css = layout.web_css();
    toolchain.recompose_ebook(&RecomposeRequest {
        source_dir: work_dir,
        output: &output,
        extra_css: &extra_css,
    })?;
    if !output.is_file() {
        return Err(PublishError::MissingArtifact { path: output });
    }
    Ok(output)
}
