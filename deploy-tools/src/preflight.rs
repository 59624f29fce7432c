//! Checks run once before any repository is touched.
//!
//! Order: binaries, helper scripts, group, web root. The first failure aborts
//! the whole run.

use std::path::{Path, PathBuf};

use deploy_core::{config, OwnerGroup, StageToggles, ToolNames};

use crate::error::PreflightError;
use crate::toolchain::Toolchain;

/// Everything preflight needs to know about the run.
#[derive(Debug, Clone)]
pub struct PreflightPlan<'a> {
    pub tools: &'a ToolNames,
    pub toggles: StageToggles,
    pub catalog_user: Option<&'a str>,
    pub scripts_dir: &'a Path,
    pub cache_hook: &'a Path,
    pub group: &'a str,
    pub webroot: &'a Path,
}

/// A binary the enabled stages need, with the message shown when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub tool: String,
    pub hint: &'static str,
}

/// Binaries required for the enabled stages.
pub fn required_binaries(
    tools: &ToolNames,
    toggles: StageToggles,
    catalog_user: Option<&str>,
) -> Vec<Requirement> {
    let mut required = vec![
        requirement(&tools.git, "git seems to be missing."),
        requirement(&tools.getent, "getent seems to be missing."),
        requirement(&tools.php, "PHP seems to be missing."),
    ];
    if catalog_user.is_some() {
        required.push(requirement(&tools.sudo, "sudo seems to be missing."));
    }
    if toggles.images {
        required.push(requirement(&tools.convert, "Imagemagick seems to be missing."));
        required.push(requirement(&tools.rsvg_convert, "librsvg2 seems to be missing."));
        required.push(requirement(&tools.cavif, "cavif seems to be missing."));
    }
    if toggles.build {
        required.push(requirement(
            &tools.se,
            "Standard Ebooks tools seem to be missing.",
        ));
    }
    required
}

/// Helper scripts that must sit in the scripts directory.
pub fn required_scripts(scripts_dir: &Path) -> Vec<PathBuf> {
    vec![
        scripts_dir.join(config::OPDS_SCRIPT),
        scripts_dir.join(config::RSS_SCRIPT),
    ]
}

/// Run every check and return the resolved owning group.
pub fn run(plan: &PreflightPlan<'_>, toolchain: &dyn Toolchain) -> Result<OwnerGroup, PreflightError> {
    for req in required_binaries(plan.tools, plan.toggles, plan.catalog_user) {
        if which::which(&req.tool).is_err() {
            return Err(PreflightError::MissingDependency {
                tool: req.tool,
                hint: req.hint,
            });
        }
    }
    tracing::debug!("all required binaries resolved");

    check_executable(plan.cache_hook)?;
    for script in required_scripts(plan.scripts_dir) {
        if !script.is_file() {
            return Err(PreflightError::MissingScript { path: script });
        }
    }

    let gid = toolchain
        .group_id(plan.group)?
        .ok_or_else(|| PreflightError::MissingGroup {
            group: plan.group.to_string(),
        })?;

    if !plan.webroot.is_dir() {
        return Err(PreflightError::MissingWebroot {
            path: plan.webroot.to_path_buf(),
        });
    }

    Ok(OwnerGroup {
        name: plan.group.to_string(),
        gid,
    })
}

fn requirement(tool: &str, hint: &'static str) -> Requirement {
    Requirement {
        tool: tool.to_string(),
        hint,
    }
}

fn check_executable(path: &Path) -> Result<(), PreflightError> {
    if !path.is_file() {
        return Err(PreflightError::MissingScript {
            path: path.to_path_buf(),
        });
    }
    if !is_executable(path) {
        return Err(PreflightError::ScriptNotExecutable {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
