//! [`Toolchain`] backed by real processes.
//!
//! Each call builds one `std::process::Command` with explicit paths and, where
//! a tool resolves relative references, an explicit `current_dir`. The
//! deploying process never changes its own working directory.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use deploy_core::{EbookIdentifier, ToolNames};

use crate::error::ToolError;
use crate::toolchain::{BuildRequest, CatalogKind, RasterRequest, RecomposeRequest, Toolchain};

/// JPEG encoding flags shared by every rendition.
const JPEG_ARGS: &[&str] = &[
    "-sampling-factor",
    "4:2:0",
    "-strip",
    "-quality",
    "80",
    "-colorspace",
    "RGB",
    "-interlace",
    "JPEG",
];

const AVIF_QUALITY: &str = "50";

/// Process-backed toolchain.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    tools: ToolNames,
    scripts_dir: PathBuf,
    cache_hook: PathBuf,
    catalog_user: Option<String>,
}

impl SystemToolchain {
    pub fn new(
        tools: ToolNames,
        scripts_dir: PathBuf,
        cache_hook: PathBuf,
        catalog_user: Option<String>,
    ) -> Self {
        Self {
            tools,
            scripts_dir,
            cache_hook,
            catalog_user,
        }
    }

    fn git(&self, repo: &Path) -> Command {
        let mut cmd = Command::new(&self.tools.git);
        cmd.arg("-C").arg(repo);
        cmd
    }

    fn git_stdout(&self, repo: &Path, args: &[&str]) -> Result<Vec<u8>, ToolError> {
        let mut cmd = self.git(repo);
        cmd.args(args);
        run(&self.tools.git, cmd).map(|output| output.stdout)
    }
}

impl Toolchain for SystemToolchain {
    fn git_show(&self, repo: &Path, rev: &str, path: &str) -> Result<Vec<u8>, ToolError> {
        self.git_stdout(repo, &["show", &format!("{rev}:{path}")])
    }

    fn git_changed_paths(&self, repo: &Path, since: &str) -> Result<Vec<String>, ToolError> {
        // `-z` keeps non-ASCII paths verbatim instead of quoted and escaped.
        let stdout = self.git_stdout(
            repo,
            &[
                "diff",
                "--name-only",
                "--no-renames",
                "-z",
                "--end-of-options",
                since,
                "HEAD",
            ],
        )?;
        Ok(split_nul_paths(&stdout))
    }

    fn git_tree_listing(&self, repo: &Path, path: &str) -> Result<String, ToolError> {
        let stdout = self.git_stdout(repo, &["ls-tree", "-r", "HEAD", "--", path])?;
        String::from_utf8(stdout).map_err(|e| ToolError::InvalidOutput {
            tool: self.tools.git.clone(),
            message: e.to_string(),
        })
    }

    fn git_clone(&self, repo: &Path, dest: &Path) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tools.git);
        cmd.args(["clone", "--quiet"]).arg(repo).arg(dest);
        run(&self.tools.git, cmd).map(drop)
    }

    fn git_last_commit_date(&self, repo: &Path) -> Result<String, ToolError> {
        let stdout = self.git_stdout(repo, &["log", "-1", "--format=%cI"])?;
        let date = String::from_utf8_lossy(&stdout).trim().to_string();
        if date.is_empty() {
            return Err(ToolError::InvalidOutput {
                tool: self.tools.git.clone(),
                message: "empty commit date".to_string(),
            });
        }
        Ok(date)
    }

    fn build_ebook(&self, request: &BuildRequest<'_>) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tools.se);
        cmd.arg("build")
            .arg(flag_with_path("--output-dir=", request.output_dir));
        if request.check {
            cmd.arg("--check");
        }
        cmd.args(["--kindle", "--kobo"]).arg(request.source_dir);
        run(&self.tools.se, cmd).map(drop)
    }

    fn recompose_ebook(&self, request: &RecomposeRequest<'_>) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tools.se);
        cmd.args(["recompose-epub", "--xhtml", "--output"])
            .arg(request.output)
            .arg(flag_with_path("--extra-css-file=", request.extra_css))
            .arg(request.source_dir);
        run(&self.tools.se, cmd).map(drop)
    }

    fn render_raster(&self, request: &RasterRequest<'_>) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tools.convert);
        cmd.current_dir(request.working_dir)
            .arg("-resize")
            .arg(request.width.to_string());
        if let Some(crop) = request.crop {
            cmd.arg("-crop").arg(crop.to_string());
        }
        cmd.args(JPEG_ARGS).arg(request.input).arg(request.output);
        run(&self.tools.convert, cmd).map(drop)
    }

    fn encode_avif(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tools.cavif);
        cmd.args(["--quiet", "--overwrite", "--quality", AVIF_QUALITY])
            .arg(input)
            .arg("-o")
            .arg(output);
        run(&self.tools.cavif, cmd).map(drop)
    }

    fn rebuild_cache(
        &self,
        identifier: &EbookIdentifier,
        web_dir: &Path,
    ) -> Result<(), ToolError> {
        tracing::debug!("rebuilding cache for {identifier}");
        let mut cmd = Command::new(&self.cache_hook);
        cmd.arg(web_dir);
        run(&self.cache_hook.display().to_string(), cmd).map(drop)
    }

    fn generate_catalog(
        &self,
        kind: CatalogKind,
        webroot: &Path,
        weburl: &str,
    ) -> Result<(), ToolError> {
        let script = self.scripts_dir.join(kind.script_name());
        let mut cmd = match &self.catalog_user {
            Some(user) => {
                let mut cmd = Command::new(&self.tools.sudo);
                cmd.arg("-u").arg(user).arg(&self.tools.php);
                cmd
            }
            None => Command::new(&self.tools.php),
        };
        cmd.arg(&script)
            .arg("--webroot")
            .arg(webroot)
            .arg("--weburl")
            .arg(weburl);
        run(kind.script_name(), cmd).map(drop)
    }

    fn group_id(&self, group: &str) -> Result<Option<u32>, ToolError> {
        let mut cmd = Command::new(&self.tools.getent);
        cmd.args(["group", group]);
        let output = spawn(&self.tools.getent, cmd)?;
        // getent exits 2 when the key is not in the database.
        if output.status.code() == Some(2) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(failed(&self.tools.getent, &output));
        }
        parse_group_entry(&String::from_utf8_lossy(&output.stdout))
            .map(Some)
            .ok_or_else(|| ToolError::InvalidOutput {
                tool: self.tools.getent.clone(),
                message: format!("cannot read gid for group '{group}'"),
            })
    }
}

/// Paths from NUL-terminated `git diff -z` output.
fn split_nul_paths(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|byte| *byte == 0)
        .filter(|path| !path.is_empty())
        .map(|path| String::from_utf8_lossy(path).into_owned())
        .collect()
}

/// Gid from a `name:password:gid:members` line.
fn parse_group_entry(line: &str) -> Option<u32> {
    line.trim().split(':').nth(2)?.parse().ok()
}

fn flag_with_path(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

fn spawn(tool: &str, mut cmd: Command) -> Result<Output, ToolError> {
    tracing::debug!("running {:?}", cmd);
    cmd.output().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ToolError::NotFound {
                tool: tool.to_string(),
            }
        } else {
            ToolError::Spawn {
                tool: tool.to_string(),
                source,
            }
        }
    })
}

fn run(tool: &str, cmd: Command) -> Result<Output, ToolError> {
    let output = spawn(tool, cmd)?;
    if output.status.success() {
        return Ok(output);
    }
    Err(failed(tool, &output))
}

fn failed(tool: &str, output: &Output) -> ToolError {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let combined = [stdout, stderr]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    ToolError::Failed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        output: combined,
    }
}
