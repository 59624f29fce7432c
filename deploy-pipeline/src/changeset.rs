//! Commit-range change classification.
//!
//! A path heuristic, not a semantic check: any change under `src/` counts as
//! a source change even if it cannot affect the output. False positives only
//! cost a rebuild; rename detection is switched off upstream so a file moved
//! out of a watched location still lists its old path, which keeps false
//! negatives out.

use std::path::Path;

use deploy_core::CommitHash;
use deploy_tools::Toolchain;

use crate::error::PublishError;

/// Repository paths whose change triggers image regeneration.
pub const COVER_PATHS: &[&str] = &["images/cover.jpg", "images/cover.svg"];

/// Prefix whose change triggers a rebuild.
pub const SOURCES_PREFIX: &str = "src/";

/// Paths changed between a recorded commit and HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// `true` if the cover raster or vector source changed.
    pub fn touches_cover(&self) -> bool {
        self.paths
            .iter()
            .any(|path| COVER_PATHS.contains(&path.as_str()))
    }

    /// `true` if anything under `src/` changed.
    pub fn touches_sources(&self) -> bool {
        self.paths.iter().any(|path| path.starts_with(SOURCES_PREFIX))
    }
}

/// Diff `since..HEAD` once for this repository.
pub fn compute(
    toolchain: &dyn Toolchain,
    repo: &Path,
    since: &CommitHash,
) -> Result<ChangeSet, PublishError> {
    let paths = toolchain.git_changed_paths(repo, &since.0)?;
    tracing::debug!("{} path(s) changed since {since}", paths.len());
    Ok(ChangeSet::from_paths(paths))
}
