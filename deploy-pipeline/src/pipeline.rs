//! Batch entrypoint used by the CLI.

use std::path::{Path, PathBuf};

use deploy_core::FailurePolicy;
use deploy_tools::{CatalogKind, Toolchain};

use crate::error::PublishError;
use crate::perms;
use crate::repository::{self, PublishSettings, RepoReport, Stage};

/// What happened to the OPDS and RSS catalogs after the repositories.
#[derive(Debug)]
pub enum CatalogOutcome {
    Regenerated,
    /// The batch stopped at a failure under `FailurePolicy::AbortBatch`.
    Aborted,
    Failed(PublishError),
}

#[derive(Debug)]
pub struct BatchReport {
    pub repos: Vec<RepoReport>,
    pub catalogs: CatalogOutcome,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.repos.iter().filter(|r| r.outcome.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.repos.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Any repository or catalog failure; the process should exit non-zero.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || matches!(self.catalogs, CatalogOutcome::Failed(_))
    }
}

/// Normalize a repository argument.
///
/// Trailing `/` is trimmed. Returns `None` for a path whose last component
/// is `.git`, which shell globs over a directory of repositories pick up.
pub fn normalize_repo_arg(arg: &Path) -> Option<PathBuf> {
    let raw = arg.to_string_lossy();
    let trimmed = raw.trim_end_matches('/');
    let path = if trimmed.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    };
    if path.file_name().is_some_and(|name| name == ".git") {
        return None;
    }
    Some(path)
}

/// Deploy every repository in order, then regenerate the catalogs.
pub fn run(
    settings: &PublishSettings,
    toolchain: &dyn Toolchain,
    repos: &[PathBuf],
) -> BatchReport {
    let mut reports = Vec::with_capacity(repos.len());
    let mut aborted = false;

    for arg in repos {
        let Some(repo) = normalize_repo_arg(arg) else {
            tracing::debug!("ignoring {}", arg.display());
            continue;
        };

        let report = if repo.is_dir() {
            repository::publish_repository(settings, toolchain, &repo)
        } else {
            tracing::error!("{}: not a directory", repo.display());
            let error = PublishError::NotARepository { path: repo.clone() };
            RepoReport::failed(&repo, Stage::SkipCheck, error)
        };

        let failed = report.outcome.is_failed();
        reports.push(report);
        if failed && settings.failure_policy == FailurePolicy::AbortBatch {
            tracing::warn!("stopping the batch after the first failure");
            aborted = true;
            break;
        }
    }

    let catalogs = if aborted {
        CatalogOutcome::Aborted
    } else {
        match regenerate_catalogs(settings, toolchain) {
            Ok(()) => CatalogOutcome::Regenerated,
            Err(err) => {
                tracing::error!("catalog regeneration failed: {err}");
                CatalogOutcome::Failed(err)
            }
        }
    };

    BatchReport {
        repos: reports,
        catalogs,
    }
}

/// Regenerate OPDS then RSS and share the results with the owning group.
pub fn regenerate_catalogs(
    settings: &PublishSettings,
    toolchain: &dyn Toolchain,
) -> Result<(), PublishError> {
    for kind in CatalogKind::all() {
        tracing::info!("regenerating {kind} catalog");
        toolchain.generate_catalog(*kind, settings.layout.root(), &settings.weburl)?;
    }
    for dir in [settings.layout.opds_dir(), settings.layout.rss_dir()] {
        if dir.exists() {
            perms::share_tree(&dir, &settings.group)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/repos/emma/", Some("/repos/emma"))]
    #[case("/repos/emma", Some("/repos/emma"))]
    #[case("emma//", Some("emma"))]
    #[case("/repos/.git", None)]
    #[case("/repos/.git/", None)]
    #[case("/", Some("/"))]
    fn repo_arguments_are_normalized(#[case] arg: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            normalize_repo_arg(Path::new(arg)),
            expected.map(PathBuf::from)
        );
    }
}
