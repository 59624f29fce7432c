//! Web-compatibility rewrites of a built ebook tree.
//!
//! The epub sources are valid XHTML for reading systems; served raw on the
//! web they need extensionless links, the site stylesheet, an HTML `lang`
//! attribute, a site-wide title and a viewport. Every rule here is
//! idempotent: applying it to its own output changes nothing.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use walkdir::{DirEntry, WalkDir};

use deploy_core::layout::WEB_CSS_HREF;

use crate::error::{io_err, PublishError};
use crate::fsops;
use crate::writer::{self, WriteResult};

/// File name of the staged single-page view.
pub const SINGLE_PAGE_FILE: &str = "single-page.xhtml";

pub const STYLESHEET_LINK: &str =
    r#"<link href="/css/web.css" media="screen" rel="stylesheet" type="text/css"/>"#;
pub const VIEWPORT_META: &str =
    r#"<meta content="width=device-width, initial-scale=1" name="viewport"/>"#;

static XHTML_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"\b((?:href|src)="[^"#:]*?)\.xhtml([#"])"##).expect("valid regex")
});

static EPUB_CSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*-epub-[a-z-]+\s*:[^;}]*;?[ \t]*\n?").expect("valid regex"));

static XML_LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\slang="[^"]*")?(\s)xml:lang="([^"]*)"(?:\s+lang="[^"]*")?"#)
        .expect("valid regex")
});

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]*)</title>").expect("valid regex"));

static VIEWPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="viewport""#).expect("valid regex"));

/// One rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// `href="chapter-1.xhtml#x"` → `href="chapter-1#x"` (relative only).
    StripXhtmlExtensions,
    /// Link the site stylesheet after `</title>`.
    InjectStylesheet,
    /// Drop `-epub-*` declarations from CSS.
    StripEpubCss,
    /// Mirror `xml:lang` into a single `lang` placed right after it.
    AddLangAttribute,
    /// Prefix `<title>` with the work title.
    PrefixTitle,
    /// Add the responsive viewport meta after `</title>`.
    InjectViewport,
}

/// Rules for the ebook's own XHTML, in order.
pub const CONTENT_RULES: &[Rule] = &[
    Rule::StripXhtmlExtensions,
    Rule::InjectStylesheet,
    Rule::AddLangAttribute,
    Rule::PrefixTitle,
];

/// Rules for the recomposed single page; it already links the stylesheet.
pub const SINGLE_PAGE_RULES: &[Rule] = &[
    Rule::StripXhtmlExtensions,
    Rule::AddLangAttribute,
    Rule::PrefixTitle,
];

/// Applies rules for one work.
#[derive(Debug, Clone)]
pub struct WebCompat {
    work_title: String,
}

impl WebCompat {
    pub fn new(work_title: impl Into<String>) -> Self {
        Self {
            work_title: work_title.into(),
        }
    }

    pub fn apply<'t>(&self, rule: Rule, text: &'t str) -> Cow<'t, str> {
        match rule {
            Rule::StripXhtmlExtensions => XHTML_REF_RE.replace_all(text, "${1}${2}"),
            Rule::InjectStylesheet => {
                if text.contains(&format!(r#"href="{WEB_CSS_HREF}""#)) {
                    Cow::Borrowed(text)
                } else {
                    inject_after_title(text, STYLESHEET_LINK)
                }
            }
            Rule::StripEpubCss => EPUB_CSS_RE.replace_all(text, ""),
            Rule::AddLangAttribute => XML_LANG_RE.replace_all(text, |caps: &Captures<'_>| {
                format!(r#"{}xml:lang="{1}" lang="{1}""#, &caps[1], &caps[2])
            }),
            Rule::PrefixTitle => TITLE_RE.replace_all(text, |caps: &Captures<'_>| {
                let current = &caps[1];
                if current == self.work_title
                    || current.starts_with(&format!("{} - ", self.work_title))
                {
                    caps[0].to_string()
                } else {
                    format!("<title>{} - {current}</title>", self.work_title)
                }
            }),
            Rule::InjectViewport => {
                if VIEWPORT_RE.is_match(text) {
                    Cow::Borrowed(text)
                } else {
                    inject_after_title(text, VIEWPORT_META)
                }
            }
        }
    }

    pub fn apply_all(&self, rules: &[Rule], text: &str) -> String {
        rules
            .iter()
            .fold(text.to_string(), |acc, rule| self.apply(*rule, &acc).into_owned())
    }

    fn rewrite(&self, path: &Path, rules: &[Rule]) -> Result<WriteResult, PublishError> {
        writer::rewrite_file(path, |text| self.apply_all(rules, text))
    }
}

fn inject_after_title<'t>(text: &'t str, element: &str) -> Cow<'t, str> {
    match text.find("</title>") {
        Some(idx) => {
            let end = idx + "</title>".len();
            let mut out = String::with_capacity(text.len() + element.len() + 3);
            out.push_str(&text[..end]);
            out.push_str("\n\t\t");
            out.push_str(element);
            out.push_str(&text[end..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// Counts of files touched by [`rewrite_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub rewritten: usize,
    pub unchanged: usize,
}

impl RewriteSummary {
    fn record(&mut self, result: &WriteResult) {
        if result.changed() {
            self.rewritten += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn files_with_extensions(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, PublishError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Rewrite a built work directory for the web.
///
/// `single_page` is the staged recomposition output, if any; it is moved to
/// `src/epub/text/single-page.xhtml` after the content pass.
pub fn rewrite_tree(
    work_dir: &Path,
    single_page: Option<&Path>,
    work_title: &str,
) -> Result<RewriteSummary, PublishError> {
    let compat = WebCompat::new(work_title);
    let epub_dir = work_dir.join("src").join("epub");
    let mut summary = RewriteSummary::default();

    for path in files_with_extensions(&epub_dir, &["xhtml"])? {
        summary.record(&compat.rewrite(&path, CONTENT_RULES)?);
    }
    for path in files_with_extensions(&epub_dir, &["css"])? {
        summary.record(&compat.rewrite(&path, &[Rule::StripEpubCss])?);
    }

    if let Some(staged) = single_page {
        let text_dir = epub_dir.join("text");
        fs::create_dir_all(&text_dir).map_err(|e| io_err(&text_dir, e))?;
        let destination = text_dir.join(SINGLE_PAGE_FILE);
        fsops::move_path(staged, &destination)?;
        summary.record(&compat.rewrite(&destination, SINGLE_PAGE_RULES)?);
    }

    for path in files_with_extensions(work_dir, &["xhtml", "html"])? {
        summary.record(&compat.rewrite(&path, &[Rule::InjectViewport])?);
    }

    tracing::debug!(
        "web rewrite: {} file(s) changed, {} unchanged",
        summary.rewritten,
        summary.unchanged
    );
    Ok(summary)
}
