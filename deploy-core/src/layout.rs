//! Filesystem layout of the web root and the local state directory.
//!
//! # Web root
//!
//! ```text
//! <webroot>/www/
//!   css/web.css                 (shared web stylesheet)
//!   ebooks/<web_path>/          (one directory per ebook, downloads/ inside)
//!   images/covers/              (<url_safe>-hero*.{jpg,avif}, <url_safe>-cover*.{jpg,avif})
//!   opds/                       (regenerated OPDS catalog)
//!   rss/                        (regenerated RSS feeds)
//! ```
//!
//! # State directory
//!
//! ```text
//! ~/.deploy-ebook/
//!   config.yaml                 (optional)
//!   hashes/<url_safe>.json      (publish ledger)
//! ```

use std::path::{Path, PathBuf};

use crate::types::EbookIdentifier;

/// Href of the shared stylesheet as seen from published pages.
pub const WEB_CSS_HREF: &str = "/css/web.css";

/// Name of the downloads subdirectory inside a web target directory.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Read-only view of a document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLayout {
    root: PathBuf,
}

impl WebLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn www(&self) -> PathBuf {
        self.root.join("www")
    }

    pub fn web_css(&self) -> PathBuf {
        self.www().join("css").join("web.css")
    }

    pub fn ebooks_dir(&self) -> PathBuf {
        self.www().join("ebooks")
    }

    /// `<webroot>/www/ebooks/<web_path>`
    pub fn ebook_dir(&self, identifier: &EbookIdentifier) -> PathBuf {
        identifier
            .web_path()
            .split('/')
            .fold(self.ebooks_dir(), |dir, segment| dir.join(segment))
    }

    pub fn covers_dir(&self) -> PathBuf {
        self.www().join("images").join("covers")
    }

    pub fn opds_dir(&self) -> PathBuf {
        self.www().join("opds")
    }

    pub fn rss_dir(&self) -> PathBuf {
        self.www().join("rss")
    }
}

/// `<home>/.deploy-ebook`
pub fn state_root(home: &Path) -> PathBuf {
    home.join(".deploy-ebook")
}

/// `<home>/.deploy-ebook/config.yaml`
pub fn config_path(home: &Path) -> PathBuf {
    state_root(home).join("config.yaml")
}

/// `<state_root>/hashes/<url_safe>.json`
pub fn ledger_path(state_root: &Path, identifier: &EbookIdentifier) -> PathBuf {
    state_root
        .join("hashes")
        .join(format!("{}.json", identifier.url_safe()))
}
