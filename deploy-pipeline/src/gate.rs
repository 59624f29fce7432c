//! Rebuild gating.
//!
//! Decides, per repository, whether covers are regenerated and whether the
//! ebook is rebuilt. Precedence:
//! 1. A disabled toggle always wins.
//! 2. `CommitRange`: the change set since the recorded commit.
//! 3. `ContentHash`: current digests against the publish ledger.
//! 4. `Always`: whatever the toggles say.

use std::fmt;
use std::path::Path;

use deploy_core::{CommitHash, EbookIdentifier, GateMode, StageToggles};
use deploy_tools::Toolchain;

use crate::changeset::{self, ChangeSet};
use crate::error::PublishError;
use crate::hash_store::{self, DigestMap, PublishLedger, IMAGES_KEY, SOURCES_KEY};

pub const COVER_RASTER_PATH: &str = "images/cover.jpg";
pub const COVER_VECTOR_PATH: &str = "images/cover.svg";
pub const SOURCES_DIR: &str = "src";

/// Whether one concern runs, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub run: bool,
    pub reason: String,
}

impl Decision {
    fn run(reason: impl Into<String>) -> Self {
        Self {
            run: true,
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            run: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.run { "run" } else { "skip" };
        write!(f, "{verb} ({})", self.reason)
    }
}

/// Per-repository plan. Never shared between repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPlan {
    pub images: Decision,
    pub build: Decision,
}

impl RebuildPlan {
    pub fn anything(&self) -> bool {
        self.images.run || self.build.run
    }
}

/// Cover sources read from HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSources {
    pub raster: Vec<u8>,
    pub vector: Vec<u8>,
}

impl CoverSources {
    pub fn read(toolchain: &dyn Toolchain, repo: &Path) -> Result<Self, PublishError> {
        Ok(Self {
            raster: toolchain.git_show(repo, "HEAD", COVER_RASTER_PATH)?,
            vector: toolchain.git_show(repo, "HEAD", COVER_VECTOR_PATH)?,
        })
    }

    pub fn digest(&self) -> String {
        hash_store::digest_parts(&[&self.raster, &self.vector])
    }
}

/// What the gate learned about HEAD, reused by later stages and the ledger.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub covers: Option<CoverSources>,
    pub sources_digest: Option<String>,
}

impl Snapshot {
    /// Digests of the concerns that ran, for the ledger.
    pub fn published_digests(&self, plan: &RebuildPlan) -> DigestMap {
        let mut digests = DigestMap::new();
        if plan.images.run {
            if let Some(covers) = &self.covers {
                digests.insert(IMAGES_KEY.to_string(), covers.digest());
            }
        }
        if plan.build.run {
            if let Some(sources) = &self.sources_digest {
                digests.insert(SOURCES_KEY.to_string(), sources.clone());
            }
        }
        digests
    }
}

fn disabled(flag: &str) -> Decision {
    Decision::skip(format!("disabled by {flag}"))
}

pub fn plan_from_toggles(toggles: StageToggles) -> RebuildPlan {
    RebuildPlan {
        images: if toggles.images {
            Decision::run("enabled")
        } else {
            disabled("--no-images")
        },
        build: if toggles.build {
            Decision::run("enabled")
        } else {
            disabled("--no-build")
        },
    }
}

/// Toggles can only be switched off by the change set, never on.
pub fn plan_from_changes(
    toggles: StageToggles,
    changes: &ChangeSet,
    since: &CommitHash,
) -> RebuildPlan {
    let mut plan = plan_from_toggles(toggles);
    if plan.images.run {
        plan.images = if changes.touches_cover() {
            Decision::run(format!("cover changed since {since}"))
        } else {
            Decision::skip(format!("cover unchanged since {since}"))
        };
    }
    if plan.build.run {
        plan.build = if changes.touches_sources() {
            Decision::run(format!("sources changed since {since}"))
        } else {
            Decision::skip(format!("sources unchanged since {since}"))
        };
    }
    plan
}

fn compare(current: Option<&str>, ledger: Option<&PublishLedger>, key: &str) -> Decision {
    match (current, ledger.and_then(|l| l.digest(key))) {
        (Some(now), Some(then)) if now == then => {
            Decision::skip(format!("{key} digest matches last publish"))
        }
        (_, Some(_)) => Decision::run(format!("{key} digest changed")),
        (_, None) => Decision::run(format!("no {key} digest recorded")),
    }
}

pub fn plan_from_digests(
    toggles: StageToggles,
    images_digest: Option<&str>,
    sources_digest: Option<&str>,
    ledger: Option<&PublishLedger>,
) -> RebuildPlan {
    let mut plan = plan_from_toggles(toggles);
    if plan.images.run {
        plan.images = compare(images_digest, ledger, IMAGES_KEY);
    }
    if plan.build.run {
        plan.build = compare(sources_digest, ledger, SOURCES_KEY);
    }
    plan
}

fn sources_digest(toolchain: &dyn Toolchain, repo: &Path) -> Result<String, PublishError> {
    let listing = toolchain.git_tree_listing(repo, SOURCES_DIR)?;
    Ok(hash_store::digest_parts(&[listing.as_bytes()]))
}

/// Build the plan for one repository and capture what HEAD looks like.
///
/// Cover bytes are only read when images will run (or the content-hash
/// gate needs them), so a repository gated off by its change set is never
/// required to carry cover files.
pub fn decide(
    toolchain: &dyn Toolchain,
    repo: &Path,
    identifier: &EbookIdentifier,
    toggles: StageToggles,
    gate: &GateMode,
    state_root: Option<&Path>,
) -> Result<(RebuildPlan, Snapshot), PublishError> {
    let mut snapshot = Snapshot::default();

    let plan = match gate {
        GateMode::Always => plan_from_toggles(toggles),
        GateMode::CommitRange(since) => {
            let changes = changeset::compute(toolchain, repo, since)?;
            plan_from_changes(toggles, &changes, since)
        }
        GateMode::ContentHash => {
            if toggles.images {
                snapshot.covers = Some(CoverSources::read(toolchain, repo)?);
            }
            if toggles.build {
                snapshot.sources_digest = Some(sources_digest(toolchain, repo)?);
            }
            let ledger = match state_root {
                Some(root) => hash_store::load_at(root, identifier)?,
                None => None,
            };
            let images_digest = snapshot.covers.as_ref().map(CoverSources::digest);
            plan_from_digests(
                toggles,
                images_digest.as_deref(),
                snapshot.sources_digest.as_deref(),
                ledger.as_ref(),
            )
        }
    };

    if plan.images.run && snapshot.covers.is_none() {
        snapshot.covers = Some(CoverSources::read(toolchain, repo)?);
    }
    if plan.build.run && snapshot.sources_digest.is_none() {
        snapshot.sources_digest = Some(sources_digest(toolchain, repo)?);
    }

    tracing::info!(
        "{identifier}: images {}, build {} ({gate})",
        plan.images,
        plan.build
    );
    Ok((plan, snapshot))
}
