//! Shared fixtures: a recording fake toolchain and plain-directory "repositories".
//!
//! The fake treats a repository directory as its own HEAD: `git_show` reads
//! the working file and `git_clone` copies the tree. Outputs the real tools
//! would produce are fabricated so the rest of the pipeline runs for real.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use deploy_core::{EbookIdentifier, OwnerGroup, WebLayout};
use deploy_pipeline::PublishSettings;
use deploy_tools::{
    BuildRequest, CatalogKind, RasterRequest, RecomposeRequest, ToolError, Toolchain,
};
use tempfile::TempDir;
use walkdir::WalkDir;

pub struct FakeToolchain {
    pub calls: RefCell<Vec<String>>,
    pub changed_paths: Vec<String>,
    pub commit_date: String,
    /// Repository directory names whose build fails.
    pub failing_builds: HashSet<String>,
    pub gid: u32,
}

impl FakeToolchain {
    pub fn new(gid: u32) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            changed_paths: Vec::new(),
            commit_date: "2023-04-05T10:11:12+02:00".to_string(),
            failing_builds: HashSet::new(),
            gid,
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn failed(tool: &str, output: impl Into<String>) -> ToolError {
    ToolError::Failed {
        tool: tool.to_string(),
        status: "exit status: 1".to_string(),
        output: output.into(),
    }
}

fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| failed("fake", e.to_string()))?;
    }
    fs::write(path, contents).map_err(|e| failed("fake", e.to_string()))
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Toolchain for FakeToolchain {
    fn git_show(&self, repo: &Path, rev: &str, path: &str) -> Result<Vec<u8>, ToolError> {
        self.record(format!("git show {rev}:{path}"));
        fs::read(repo.join(path)).map_err(|_| {
            failed(
                "git",
                format!("fatal: path '{path}' does not exist in '{rev}'"),
            )
        })
    }

    fn git_changed_paths(&self, _repo: &Path, since: &str) -> Result<Vec<String>, ToolError> {
        self.record(format!("git diff {since}"));
        Ok(self.changed_paths.clone())
    }

    fn git_tree_listing(&self, repo: &Path, path: &str) -> Result<String, ToolError> {
        self.record(format!("git ls-tree {path}"));
        let mut listing = String::new();
        for entry in WalkDir::new(repo.join(path)).sort_by_file_name() {
            let entry = entry.map_err(|e| failed("git", e.to_string()))?;
            if entry.file_type().is_file() {
                let bytes = fs::read(entry.path()).map_err(|e| failed("git", e.to_string()))?;
                listing.push_str(&format!("{} {}\n", bytes.len(), entry.path().display()));
                listing.push_str(&String::from_utf8_lossy(&bytes));
            }
        }
        Ok(listing)
    }

    fn git_clone(&self, repo: &Path, dest: &Path) -> Result<(), ToolError> {
        self.record("git clone");
        for entry in WalkDir::new(repo) {
            let entry = entry.map_err(|e| failed("git", e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(repo)
                .map_err(|e| failed("git", e.to_string()))?;
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| failed("git", e.to_string()))?;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| failed("git", e.to_string()))?;
            }
        }
        Ok(())
    }

    fn git_last_commit_date(&self, _repo: &Path) -> Result<String, ToolError> {
        self.record("git log");
        Ok(format!("{}\n", self.commit_date))
    }

    fn build_ebook(&self, request: &BuildRequest<'_>) -> Result<(), ToolError> {
        self.record(format!("se build check={}", request.check));
        let name = dir_name(request.source_dir);
        let opf = fs::read_to_string(request.source_dir.join("src/epub/content.opf"))
            .map_err(|e| failed("se", e.to_string()))?;
        let repo_name = opf
            .lines()
            .find_map(|line| line.trim().strip_prefix("<!-- repo: "))
            .and_then(|rest| rest.strip_suffix(" -->"))
            .unwrap_or(&name)
            .to_string();
        if self.failing_builds.contains(&repo_name) {
            return Err(failed("se", "Error: epubcheck failed"));
        }
        for file in ["ebook.epub", "ebook_advanced.epub", "ebook.azw3", "ebook.kepub.epub"] {
            write(&request.output_dir.join(file), "built")?;
        }
        write(
            &request.output_dir.join("ebook.xhtml"),
            "<html><head><title>Download</title></head></html>",
        )?;
        Ok(())
    }

    fn recompose_ebook(&self, request: &RecomposeRequest<'_>) -> Result<(), ToolError> {
        self.record(format!("se recompose-epub {}", request.extra_css.display()));
        write(
            request.output,
            concat!(
                "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en-GB\">\n",
                "\t<head>\n\t\t<title>Emma</title>\n",
                "\t\t<link href=\"/css/web.css\" media=\"screen\" rel=\"stylesheet\" type=\"text/css\"/>\n",
                "\t</head>\n",
                "\t<body><a href=\"#chapter-1\">I</a><a href=\"text/chapter-1.xhtml\">I</a></body>\n",
                "</html>\n"
            ),
        )
    }

    fn render_raster(&self, request: &RasterRequest<'_>) -> Result<(), ToolError> {
        self.record(format!(
            "convert {} {}",
            dir_name(request.input),
            dir_name(request.output)
        ));
        if !request.working_dir.join(dir_name(request.input)).is_file() {
            return Err(failed("convert", "unable to open image"));
        }
        write(request.output, format!("jpeg {}", request.width))
    }

    fn encode_avif(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.record(format!("cavif {}", dir_name(output)));
        let bytes = fs::read(input).map_err(|e| failed("cavif", e.to_string()))?;
        write(output, bytes)
    }

    fn rebuild_cache(&self, identifier: &EbookIdentifier, _web_dir: &Path) -> Result<(), ToolError> {
        self.record(format!("rebuild-cache {identifier}"));
        Ok(())
    }

    fn generate_catalog(&self, kind: CatalogKind, webroot: &Path, weburl: &str) -> Result<(), ToolError> {
        self.record(format!("php {} {weburl}", kind.script_name()));
        let dir = match kind {
            CatalogKind::Opds => webroot.join("www/opds"),
            CatalogKind::Rss => webroot.join("www/rss"),
        };
        write(&dir.join("index.xml"), "<feed/>")
    }

    fn group_id(&self, _group: &str) -> Result<Option<u32>, ToolError> {
        Ok(Some(self.gid))
    }
}

/// The gid newly created files get, so `chown` is always permitted.
pub fn own_gid(dir: &Path) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let marker = dir.join(".gid-marker");
        fs::write(&marker, "").expect("marker");
        let gid = fs::metadata(&marker).expect("marker metadata").gid();
        fs::remove_file(&marker).expect("remove marker");
        gid
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
        0
    }
}

pub struct RepoFixture<'a> {
    pub name: &'a str,
    pub identifier: &'a str,
    pub title: Option<&'a str>,
    pub draft: bool,
}

impl<'a> RepoFixture<'a> {
    pub fn new(name: &'a str, identifier: &'a str) -> Self {
        Self {
            name,
            identifier,
            title: Some("Emma"),
            draft: false,
        }
    }

    pub fn content_opf(&self) -> String {
        let date = if self.draft {
            "1900-01-01T00:00:00Z"
        } else {
            "2020-01-01T00:00:00Z"
        };
        let title = self
            .title
            .map(|t| format!("\t\t<dc:title id=\"title\">{t}</dc:title>\n"))
            .unwrap_or_default();
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
                "<!-- repo: {name} -->\n",
                "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"uid\" version=\"3.0\">\n",
                "\t<metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
                "\t\t<dc:identifier id=\"uid\">url:https://standardebooks.org/ebooks/{id}</dc:identifier>\n",
                "{title}",
                "\t\t<dc:date>{date}</dc:date>\n",
                "\t\t<meta property=\"dcterms:modified\">2020-01-01T00:00:00Z</meta>\n",
                "\t</metadata>\n",
                "</package>\n"
            ),
            name = self.name,
            id = self.identifier,
            title = title,
            date = date,
        )
    }

    /// Lay out a minimal ebook source tree under `root/<name>`.
    pub fn create(&self, root: &Path) -> PathBuf {
        let repo = root.join(self.name);
        let files: &[(&str, String)] = &[
            ("src/epub/content.opf", self.content_opf()),
            ("src/epub/onix.xml", "<ONIXMessage/>".to_string()),
            ("src/epub/toc.xhtml", chapter("Table of Contents")),
            ("src/epub/text/chapter-1.xhtml", chapter("I")),
            (
                "src/epub/css/core.css",
                "p{\n\t-epub-hyphens: auto;\n\thyphens: auto;\n}\n".to_string(),
            ),
            ("images/cover.jpg", "raster".to_string()),
            (
                "images/cover.svg",
                "<svg><image href=\"cover.jpg\"/></svg>".to_string(),
            ),
        ];
        for (path, contents) in files {
            let path = repo.join(path);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, contents).expect("write fixture");
        }
        repo
    }
}

pub fn chapter(title: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en-GB\">\n",
            "\t<head>\n\t\t<title>{}</title>\n",
            "\t\t<link href=\"../css/core.css\" rel=\"stylesheet\" type=\"text/css\"/>\n",
            "\t</head>\n",
            "\t<body><a href=\"chapter-2.xhtml#p-1\">next</a></body>\n",
            "</html>\n"
        ),
        title
    )
}

/// A throwaway web root, state root and work root.
pub struct Site {
    pub dir: TempDir,
    pub gid: u32,
}

impl Site {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        for sub in ["web/www/css", "web/www/ebooks", "state", "work", "repos"] {
            fs::create_dir_all(dir.path().join(sub)).expect("mkdir");
        }
        let gid = own_gid(dir.path());
        Self { dir, gid }
    }

    pub fn webroot(&self) -> PathBuf {
        self.dir.path().join("web")
    }

    pub fn repos(&self) -> PathBuf {
        self.dir.path().join("repos")
    }

    pub fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn layout(&self) -> WebLayout {
        WebLayout::new(self.webroot())
    }

    pub fn settings(&self) -> PublishSettings {
        let mut settings = PublishSettings::new(
            self.layout(),
            "https://standardebooks.org",
            OwnerGroup {
                name: "se".to_string(),
                gid: self.gid,
            },
        );
        settings.state_root = Some(self.dir.path().join("state"));
        settings.work_root = Some(self.work_root());
        settings
    }

    pub fn toolchain(&self) -> FakeToolchain {
        FakeToolchain::new(self.gid)
    }

    /// Entries left under the work root.
    pub fn leftover_work_dirs(&self) -> usize {
        fs::read_dir(self.work_root()).expect("read work root").count()
    }
}
