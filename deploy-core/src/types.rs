//! Domain types shared by every deploy crate.
//!
//! Filesystem locations are always `PathBuf`/`&Path`; identifiers are
//! validated newtypes so a half-parsed slug can never name a web directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The path-like slug that names an ebook on the website, e.g.
/// `mark-twain/the-prince-and-the-pauper`.
///
/// Invariants: non-empty, no leading or trailing `/`, no empty, `.` or `..`
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EbookIdentifier(String);

impl EbookIdentifier {
    /// Validate and wrap a slug.
    pub fn new(slug: impl Into<String>) -> Result<Self, MetadataError> {
        let slug = slug.into();
        let trimmed = slug.trim();
        if trimmed.is_empty() {
            return Err(MetadataError::EmptyIdentifier);
        }
        let valid = trimmed
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !valid {
            return Err(MetadataError::InvalidIdentifier {
                identifier: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Slug with `/` kept; names the web target directory.
    pub fn web_path(&self) -> &str {
        &self.0
    }

    /// Slug with `/` mapped to `_`; names generated images and ledger files.
    pub fn url_safe(&self) -> String {
        self.0.replace('/', "_")
    }
}

impl fmt::Display for EbookIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for EbookIdentifier {
    type Error = MetadataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EbookIdentifier> for String {
    fn from(id: EbookIdentifier) -> Self {
        id.0
    }
}

impl FromStr for EbookIdentifier {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A commit-ish recorded at the previous push (`--last-push-hash`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitHash(pub String);

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitHash {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the orchestrator decides whether a repository needs rebuilding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateMode {
    /// Every enabled stage runs.
    #[default]
    Always,
    /// Path heuristic over `git diff <hash> HEAD`.
    CommitRange(CommitHash),
    /// Digest comparison against the publish ledger.
    ContentHash,
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateMode::Always => write!(f, "always"),
            GateMode::CommitRange(hash) => write!(f, "commit-range since {hash}"),
            GateMode::ContentHash => write!(f, "content-hash"),
        }
    }
}

/// What happens to the rest of the batch when one repository fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next repository.
    #[default]
    Continue,
    /// Stop at the first failure and skip catalog regeneration.
    AbortBatch,
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Feature toggles from the command line, before any gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageToggles {
    pub images: bool,
    pub build: bool,
    pub epubcheck: bool,
    pub recompose: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            images: true,
            build: true,
            epubcheck: true,
            recompose: true,
        }
    }
}

/// A group resolved during preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerGroup {
    pub name: String,
    pub gid: u32,
}

impl fmt::Display for OwnerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.gid)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
