//! The deployment command: resolve settings, run preflight, deploy the batch.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use deploy_core::{
    config::{self, DeployConfig},
    layout, CommitHash, FailurePolicy, GateMode, StageToggles, WebLayout,
};
use deploy_pipeline::{pipeline, CatalogOutcome, PublishSettings};
use deploy_tools::{
    preflight::{self, PreflightPlan},
    SystemToolchain,
};

use crate::report;

/// Arguments for `deploy-ebook-to-www`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Increase output verbosity.
    #[arg(short, long)]
    pub verbose: bool,

    /// Group to own the published files [default: se].
    #[arg(short, long, value_name = "GROUP")]
    pub group: Option<String>,

    /// Path to the web document root [default: /standardebooks.org/web].
    #[arg(long, value_name = "PATH")]
    pub webroot: Option<PathBuf>,

    /// Public base URL for catalogs [default: https://standardebooks.org].
    #[arg(long, value_name = "URL")]
    pub weburl: Option<String>,

    /// Don't regenerate cover and hero images.
    #[arg(long)]
    pub no_images: bool,

    /// Don't build the ebook (also skips validation and the single-page view).
    #[arg(long)]
    pub no_build: bool,

    /// Build without running epubcheck.
    #[arg(long)]
    pub no_epubcheck: bool,

    /// Don't generate the single-page view.
    #[arg(long)]
    pub no_recompose: bool,

    /// Only rebuild what changed since this commit.
    #[arg(short = 'l', long, value_name = "HASH", conflicts_with = "skip_unchanged")]
    pub last_push_hash: Option<String>,

    /// Only rebuild what changed since the last recorded publish.
    #[arg(long)]
    pub skip_unchanged: bool,

    /// Stop at the first repository that fails.
    #[arg(long)]
    pub fail_fast: bool,

    /// Configuration file [default: ~/.deploy-ebook/config.yaml when present].
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Ebook source repositories to deploy.
    #[arg(value_name = "DIRECTORY", required = true, num_args = 1..)]
    pub directories: Vec<PathBuf>,
}

impl DeployArgs {
    pub fn toggles(&self) -> StageToggles {
        StageToggles {
            images: !self.no_images,
            build: !self.no_build,
            epubcheck: !self.no_epubcheck,
            recompose: !self.no_recompose,
        }
    }

    pub fn gate(&self) -> GateMode {
        match (&self.last_push_hash, self.skip_unchanged) {
            (Some(hash), _) => GateMode::CommitRange(CommitHash::from(hash.as_str())),
            (None, true) => GateMode::ContentHash,
            (None, false) => GateMode::Always,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::AbortBatch
        } else {
            FailurePolicy::Continue
        }
    }

    fn load_config(&self, home: Option<&PathBuf>) -> Result<DeployConfig> {
        match (&self.config, home) {
            (Some(path), _) => config::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display())),
            (None, Some(home)) => {
                config::load_at(home).context("failed to load ~/.deploy-ebook/config.yaml")
            }
            (None, None) => Ok(DeployConfig::default()),
        }
    }

    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir();
        let cfg = self.load_config(home.as_ref())?;

        let group = self.group.clone().unwrap_or_else(|| cfg.group_or_default());
        let webroot = self
            .webroot
            .clone()
            .unwrap_or_else(|| cfg.webroot_or_default());
        let weburl = self
            .weburl
            .clone()
            .unwrap_or_else(|| cfg.weburl_or_default());

        let exe = std::env::current_exe().context("could not locate the running binary")?;
        let exe_dir = exe
            .parent()
            .context("running binary has no parent directory")?;
        let scripts_dir = cfg.scripts_dir_or(exe_dir);
        let cache_hook = cfg.cache_hook_in(&scripts_dir);
        let toggles = self.toggles();

        let toolchain = SystemToolchain::new(
            cfg.tools.clone(),
            scripts_dir.clone(),
            cache_hook.clone(),
            cfg.catalog_user.clone(),
        );

        let owner = preflight::run(
            &PreflightPlan {
                tools: &cfg.tools,
                toggles,
                catalog_user: cfg.catalog_user.as_deref(),
                scripts_dir: &scripts_dir,
                cache_hook: &cache_hook,
                group: &group,
                webroot: &webroot,
            },
            &toolchain,
        )
        .context("preflight failed")?;
        tracing::info!("deploying as group {owner} into {}", webroot.display());

        let mut settings = PublishSettings::new(WebLayout::new(webroot), weburl, owner);
        settings.toggles = toggles;
        settings.gate = self.gate();
        settings.failure_policy = self.failure_policy();
        settings.state_root = home.as_deref().map(layout::state_root);
        settings.work_root = cfg.work_dir.clone();

        let batch = pipeline::run(&settings, &toolchain, &self.directories);
        report::print_batch(&batch);

        if batch.failed() > 0 {
            bail!(
                "{} of {} repositories failed",
                batch.failed(),
                batch.repos.len()
            );
        }
        if let CatalogOutcome::Failed(err) = &batch.catalogs {
            bail!("catalog regeneration failed: {err}");
        }
        Ok(())
    }
}
