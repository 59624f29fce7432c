//! The collaborator boundary.
//!
//! Everything the deployment delegates to another program goes through
//! [`Toolchain`]. The pipeline never spawns processes itself, so tests drive
//! it with a fake that records calls and fabricates output files.

use std::fmt;
use std::path::Path;

use deploy_core::{config, EbookIdentifier};

use crate::error::ToolError;

/// A crop window, rendered as ImageMagick geometry `WxH+X+Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// `se build` invocation.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub source_dir: &'a Path,
    pub output_dir: &'a Path,
    /// Run epubcheck as part of the build.
    pub check: bool,
}

/// `se recompose-epub` invocation.
#[derive(Debug, Clone, Copy)]
pub struct RecomposeRequest<'a> {
    pub source_dir: &'a Path,
    pub output: &'a Path,
    pub extra_css: &'a Path,
}

/// Resize (and optionally crop) an image into a baseline JPEG.
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Relative references inside `input` resolve against this directory.
    pub working_dir: &'a Path,
    pub width: u32,
    pub crop: Option<Crop>,
}

/// The two catalogs regenerated after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Opds,
    Rss,
}

impl CatalogKind {
    pub fn all() -> &'static [CatalogKind] {
        &[CatalogKind::Opds, CatalogKind::Rss]
    }

    pub fn script_name(self) -> &'static str {
        match self {
            CatalogKind::Opds => config::OPDS_SCRIPT,
            CatalogKind::Rss => config::RSS_SCRIPT,
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Opds => write!(f, "OPDS"),
            CatalogKind::Rss => write!(f, "RSS"),
        }
    }
}

/// External programs the deployment depends on.
pub trait Toolchain {
    /// Contents of `path` at `rev` (`git show <rev>:<path>`).
    fn git_show(&self, repo: &Path, rev: &str, path: &str) -> Result<Vec<u8>, ToolError>;

    /// Paths changed between `since` and HEAD, rename detection off.
    fn git_changed_paths(&self, repo: &Path, since: &str) -> Result<Vec<String>, ToolError>;

    /// Recursive tree listing of `path` at HEAD (object ids included).
    fn git_tree_listing(&self, repo: &Path, path: &str) -> Result<String, ToolError>;

    /// Clone `repo` into the existing, empty directory `dest`.
    fn git_clone(&self, repo: &Path, dest: &Path) -> Result<(), ToolError>;

    /// Committer date of HEAD in strict ISO 8601.
    fn git_last_commit_date(&self, repo: &Path) -> Result<String, ToolError>;

    fn build_ebook(&self, request: &BuildRequest<'_>) -> Result<(), ToolError>;

    fn recompose_ebook(&self, request: &RecomposeRequest<'_>) -> Result<(), ToolError>;

    fn render_raster(&self, request: &RasterRequest<'_>) -> Result<(), ToolError>;

    fn encode_avif(&self, input: &Path, output: &Path) -> Result<(), ToolError>;

    /// Ask the site to rebuild its cache for one published ebook.
    fn rebuild_cache(&self, identifier: &EbookIdentifier, web_dir: &Path)
        -> Result<(), ToolError>;

    fn generate_catalog(
        &self,
        kind: CatalogKind,
        webroot: &Path,
        weburl: &str,
    ) -> Result<(), ToolError>;

    /// Numeric id of `group`, or `None` if no such group exists.
    fn group_id(&self, group: &str) -> Result<Option<u32>, ToolError>;
}
