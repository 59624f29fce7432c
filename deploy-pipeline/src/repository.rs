//! One repository, start to finish.
//!
//! Stages run in a fixed order and every one of them can end the repository:
//!
//! ```text
//! SkipCheck → DiffClassify → ImageGenerate → BuildAndValidate → Recompose
//!           → WebCompatRewrite → Publish → CacheRefresh
//! ```
//!
//! Nothing reaches the web root before `Publish`, so a failure in an earlier
//! stage leaves the live site exactly as it was. Temporary directories are
//! dropped on every exit path.
//!
//! When the gate leaves nothing to rebuild, `DiffClassify` goes straight to
//! `CacheRefresh`.

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use deploy_core::metadata::{self, CONTENT_OPF_PATH};
use deploy_core::{
    EbookIdentifier, FailurePolicy, GateMode, MetadataError, OwnerGroup, PackageMetadata,
    StageToggles, WebLayout,
};
use deploy_tools::Toolchain;

use crate::error::{io_err, PublishError};
use crate::gate::{self, RebuildPlan};
use crate::rewrite::RewriteSummary;
use crate::{build, hash_store, images, perms, publish, rewrite};

/// Resolved settings for a batch.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub layout: WebLayout,
    pub weburl: String,
    pub group: OwnerGroup,
    pub toggles: StageToggles,
    pub gate: GateMode,
    pub failure_policy: FailurePolicy,
    /// Where the publish ledger lives; `None` disables it.
    pub state_root: Option<PathBuf>,
    /// Parent for temporary directories; `None` uses the system temp dir.
    pub work_root: Option<PathBuf>,
}

impl PublishSettings {
    pub fn new(layout: WebLayout, weburl: impl Into<String>, group: OwnerGroup) -> Self {
        Self {
            layout,
            weburl: weburl.into(),
            group,
            toggles: StageToggles::default(),
            gate: GateMode::default(),
            failure_policy: FailurePolicy::default(),
            state_root: None,
            work_root: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SkipCheck,
    DiffClassify,
    ImageGenerate,
    BuildAndValidate,
    Recompose,
    WebCompatRewrite,
    Publish,
    CacheRefresh,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SkipCheck => "skip check",
            Stage::DiffClassify => "change classification",
            Stage::ImageGenerate => "image generation",
            Stage::BuildAndValidate => "build",
            Stage::Recompose => "recompose",
            Stage::WebCompatRewrite => "web rewrite",
            Stage::Publish => "publish",
            Stage::CacheRefresh => "cache refresh",
        };
        f.write_str(name)
    }
}

/// How a repository ended.
#[derive(Debug)]
pub enum RepoOutcome {
    Published {
        plan: RebuildPlan,
        images: usize,
        rewrites: RewriteSummary,
    },
    Skipped {
        reason: String,
    },
    Failed {
        stage: Stage,
        error: PublishError,
    },
}

impl RepoOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RepoOutcome::Published { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RepoOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct RepoReport {
    pub repo: PathBuf,
    pub identifier: Option<EbookIdentifier>,
    pub outcome: RepoOutcome,
}

impl RepoReport {
    pub(crate) fn failed(repo: &Path, stage: Stage, error: PublishError) -> Self {
        Self {
            repo: repo.to_path_buf(),
            identifier: None,
            outcome: RepoOutcome::Failed { stage, error },
        }
    }
}

struct Failure {
    stage: Stage,
    error: PublishError,
}

fn at<T>(stage: Stage, result: Result<T, PublishError>) -> Result<T, Failure> {
    result.map_err(|error| Failure { stage, error })
}

/// `None` for a draft.
fn read_metadata(
    toolchain: &dyn Toolchain,
    repo: &Path,
) -> Result<Option<PackageMetadata>, PublishError> {
    let bytes = toolchain.git_show(repo, "HEAD", CONTENT_OPF_PATH)?;
    let opf = String::from_utf8(bytes).map_err(MetadataError::from)?;
    if metadata::is_draft(&opf) {
        return Ok(None);
    }
    Ok(Some(PackageMetadata::parse(&opf)?))
}

fn temp_dir(settings: &PublishSettings, prefix: &str) -> Result<TempDir, PublishError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match &settings.work_root {
        Some(root) => builder.tempdir_in(root).map_err(|e| io_err(root, e)),
        None => builder
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e)),
    }
}

/// Deploy one repository. Never panics on a repository problem; every
/// error is captured in the returned report.
pub fn publish_repository(
    settings: &PublishSettings,
    toolchain: &dyn Toolchain,
    repo: &Path,
) -> RepoReport {
    let mut identifier = None;
    let outcome = match run_stages(settings, toolchain, repo, &mut identifier) {
        Ok(outcome) => outcome,
        Err(Failure { stage, error }) => {
            tracing::error!("{}: {stage} failed: {error}", repo.display());
            RepoOutcome::Failed { stage, error }
        }
    };
    RepoReport {
        repo: repo.to_path_buf(),
        identifier,
        outcome,
    }
}

fn run_stages(
    settings: &PublishSettings,
    toolchain: &dyn Toolchain,
    repo: &Path,
    identifier_slot: &mut Option<EbookIdentifier>,
) -> Result<RepoOutcome, Failure> {
    let Some(package) = at(Stage::SkipCheck, read_metadata(toolchain, repo))? else {
        tracing::info!("{}: draft, skipping", repo.display());
        return Ok(RepoOutcome::Skipped {
            reason: "draft (placeholder date)".to_string(),
        });
    };
    let identifier = package.identifier.clone();
    *identifier_slot = Some(identifier.clone());
    tracing::info!("{}: deploying {identifier}", repo.display());

    let (plan, snapshot) = at(
        Stage::DiffClassify,
        gate::decide(
            toolchain,
            repo,
            &identifier,
            settings.toggles,
            &settings.gate,
            settings.state_root.as_deref(),
        ),
    )?;
    let target = settings.layout.ebook_dir(&identifier);
    if !plan.anything() {
        at(Stage::CacheRefresh, refresh_cache(toolchain, &identifier, &target))?;
        return Ok(RepoOutcome::Skipped {
            reason: format!("images: {}; build: {}", plan.images.reason, plan.build.reason),
        });
    }

    let mut generated = Vec::new();
    let scratch = at(Stage::ImageGenerate, temp_dir(settings, "deploy-ebook-images-"))?;
    if let (true, Some(covers)) = (plan.images.run, snapshot.covers.as_ref()) {
        generated = at(
            Stage::ImageGenerate,
            images::generate(toolchain, covers, scratch.path(), &identifier, &settings.group),
        )?;
    }

    let work = at(Stage::BuildAndValidate, temp_dir(settings, "deploy-ebook-"))?;
    let mut rewrites = RewriteSummary::default();
    if plan.build.run {
        at(
            Stage::BuildAndValidate,
            build::build_ebook(toolchain, repo, work.path(), settings.toggles.epubcheck),
        )?;

        let single_page = if settings.toggles.recompose {
            Some(at(
                Stage::Recompose,
                build::recompose(toolchain, work.path(), &settings.layout),
            )?)
        } else {
            None
        };

        let work_title = at(
            Stage::WebCompatRewrite,
            package.work_title().map_err(PublishError::from),
        )?;
        rewrites = at(
            Stage::WebCompatRewrite,
            rewrite::rewrite_tree(work.path(), single_page.as_deref(), work_title),
        )?;
    }

    at(
        Stage::Publish,
        publish_outputs(settings, &plan, work.path(), &target, &generated),
    )?;

    at(Stage::CacheRefresh, refresh_cache(toolchain, &identifier, &target))?;

    if let Some(state_root) = &settings.state_root {
        let digests = snapshot.published_digests(&plan);
        if let Err(err) = hash_store::record_at(state_root, &identifier, &digests) {
            tracing::warn!("{identifier}: publish ledger not updated: {err}");
        }
    }

    tracing::info!("{identifier}: published");
    Ok(RepoOutcome::Published {
        plan,
        images: generated.len(),
        rewrites,
    })
}

fn refresh_cache(
    toolchain: &dyn Toolchain,
    identifier: &EbookIdentifier,
    target: &Path,
) -> Result<(), PublishError> {
    toolchain
        .rebuild_cache(identifier, target)
        .map_err(PublishError::from)
}

fn publish_outputs(
    settings: &PublishSettings,
    plan: &RebuildPlan,
    work_dir: &Path,
    target: &Path,
    generated: &[PathBuf],
) -> Result<(), PublishError> {
    if plan.build.run {
        publish::replace_web_dir(work_dir, target)?;
        perms::share_tree(target, &settings.group)?;
    }
    if !generated.is_empty() {
        let covers_dir = settings.layout.covers_dir();
        publish::publish_covers(generated, &covers_dir)?;
        perms::share_tree(&covers_dir, &settings.group)?;
    }
    Ok(())
}
