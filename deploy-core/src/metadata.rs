//! Package metadata (`src/epub/content.opf`) extraction.
//!
//! Only the handful of fields the deployment needs are read, with the same
//! element shapes the ebook toolchain writes. The work title is returned
//! exactly as it appears in the file (still XML-escaped) so it can be spliced
//! into other markup without another escaping pass.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::MetadataError;
use crate::types::EbookIdentifier;

/// Path of the package metadata inside a source repository.
pub const CONTENT_OPF_PATH: &str = "src/epub/content.opf";

/// Publication date that marks an ebook as an unreleased draft.
pub const DRAFT_PLACEHOLDER_DATE: &str = "1900-01-01T00:00:00Z";

/// Format of the `dcterms:modified` value.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<dc:identifier\b[^>]*\bid="uid"[^>]*>\s*([^<]*?)\s*</dc:identifier>"#).expect("valid regex")
});

static IDENTIFIER_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^url:https?://[^/]+/ebooks/?(.*)$").expect("valid regex"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<dc:title\b[^>]*\bid="title"[^>]*>\s*([^<]*?)\s*</dc:title>"#).expect("valid regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<dc:date>\s*([^<]*?)\s*</dc:date>").expect("valid regex"));

static MODIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<meta\b[^>]*\bproperty="dcterms:modified"[^>]*>)[^<]*(</meta>)"#).expect("valid regex")
});

/// Fields read from `content.opf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub identifier: EbookIdentifier,
    /// Work title, XML-escaped as in the source file.
    pub title: Option<String>,
    pub draft: bool,
}

impl PackageMetadata {
    /// Parse raw `content.opf` bytes as read from the repository.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MetadataError> {
        let text = String::from_utf8(bytes)?;
        Self::parse(&text)
    }

    /// Parse the text of `content.opf`.
    pub fn parse(opf: &str) -> Result<Self, MetadataError> {
        Ok(Self {
            identifier: parse_identifier(opf)?,
            title: parse_title(opf),
            draft: is_draft(opf),
        })
    }

    /// The work title, required once markup is rewritten.
    pub fn work_title(&self) -> Result<&str, MetadataError> {
        self.title.as_deref().ok_or(MetadataError::MissingTitle)
    }
}

/// `true` when any `<dc:date>` carries the placeholder date.
pub fn is_draft(opf: &str) -> bool {
    DATE_RE
        .captures_iter(opf)
        .any(|caps| &caps[1] == DRAFT_PLACEHOLDER_DATE)
}

/// Extract the ebook identifier from the canonical `url:` identifier.
pub fn parse_identifier(opf: &str) -> Result<EbookIdentifier, MetadataError> {
    let raw = IDENTIFIER_RE
        .captures(opf)
        .map(|caps| caps[1].to_string())
        .ok_or(MetadataError::MissingIdentifier)?;

    let slug = IDENTIFIER_URL_RE
        .captures(&raw)
        .map(|caps| caps[1].trim_end_matches('/').to_string())
        .ok_or_else(|| MetadataError::UnrecognizedIdentifier {
            identifier: raw.clone(),
        })?;

    EbookIdentifier::new(slug)
}

/// Extract the work title, if present and non-empty.
pub fn parse_title(opf: &str) -> Option<String> {
    TITLE_RE
        .captures(opf)
        .map(|caps| caps[1].to_string())
        .filter(|title| !title.is_empty())
}

/// Replace the `dcterms:modified` value with `modified`.
pub fn rewrite_modified(opf: &str, modified: DateTime<Utc>) -> Result<String, MetadataError> {
    if !MODIFIED_RE.is_match(opf) {
        return Err(MetadataError::MissingModified);
    }
    let stamp = modified.format(MODIFIED_FORMAT).to_string();
    Ok(MODIFIED_RE
        .replace(opf, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], stamp, &caps[2])
        })
        .into_owned())
}
