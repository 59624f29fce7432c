use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn deploy_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("deploy-ebook-to-www"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn directory_argument_is_required() {
    let home = TempDir::new().expect("home");
    deploy_cmd(home.path())
        .assert()
        .failure()
        .stderr(contains("DIRECTORY"));
}

#[test]
fn commit_gate_and_content_gate_conflict() {
    let home = TempDir::new().expect("home");
    deploy_cmd(home.path())
        .args(["-l", "abc123", "--skip-unchanged", "repo"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn explicit_config_must_exist() {
    let home = TempDir::new().expect("home");
    let missing = home.path().join("nope.yaml");
    deploy_cmd(home.path())
        .arg("--config")
        .arg(&missing)
        .arg("repo")
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn help_lists_gating_flags() {
    let home = TempDir::new().expect("home");
    deploy_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--last-push-hash"))
        .stdout(contains("--skip-unchanged"))
        .stdout(contains("--fail-fast"));
}

#[cfg(unix)]
mod with_stub_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const GIT_STUB: &str = "#!/bin/sh\n\
        # -C <repo> show HEAD:<path>\n\
        if [ \"$3\" = \"show\" ]; then exec cat \"$2/${4#HEAD:}\"; fi\n\
        exit 1\n";

    const GETENT_STUB: &str = "#!/bin/sh\n\
        if [ \"$2\" = \"se\" ]; then echo \"se:x:4242:\"; exit 0; fi\n\
        exit 2\n";

    const OK_STUB: &str = "#!/bin/sh\nexit 0\n";

    fn executable(path: &Path, body: &str) {
        fs::write(path, body).expect("write stub");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    struct Env {
        root: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let root = TempDir::new().expect("root");
            let bin = root.path().join("bin");
            let scripts = root.path().join("scripts");
            for dir in [&bin, &scripts, &root.path().join("web")] {
                fs::create_dir_all(dir).expect("mkdir");
            }
            executable(&bin.join("git"), GIT_STUB);
            executable(&bin.join("getent"), GETENT_STUB);
            for name in ["se", "convert", "rsvg-convert", "cavif", "php", "sudo"] {
                executable(&bin.join(name), OK_STUB);
            }
            executable(&scripts.join("rebuild-cache"), OK_STUB);
            fs::write(scripts.join("generate-opds.php"), "<?php\n").expect("opds");
            fs::write(scripts.join("generate-rss.php"), "<?php\n").expect("rss");

            let env = Self { root };
            env.write_config(&env.path("web"), &env.path("bin/se"));
            env
        }

        fn path(&self, relative: &str) -> PathBuf {
            self.root.path().join(relative)
        }

        fn config(&self) -> PathBuf {
            self.path("config.yaml")
        }

        fn write_config(&self, webroot: &Path, se: &Path) {
            let bin = self.path("bin");
            let tool = |name: &str| bin.join(name).display().to_string();
            let yaml = format!(
                "webroot: '{webroot}'\n\
                 scripts_dir: '{scripts}'\n\
                 work_dir: '{work}'\n\
                 tools:\n  git: '{git}'\n  se: '{se}'\n  convert: '{convert}'\n  \
                 rsvg_convert: '{rsvg}'\n  cavif: '{cavif}'\n  php: '{php}'\n  \
                 sudo: '{sudo}'\n  getent: '{getent}'\n",
                webroot = webroot.display(),
                scripts = self.path("scripts").display(),
                work = self.root.path().display(),
                git = tool("git"),
                se = se.display(),
                convert = tool("convert"),
                rsvg = tool("rsvg-convert"),
                cavif = tool("cavif"),
                php = tool("php"),
                sudo = tool("sudo"),
                getent = tool("getent"),
            );
            fs::write(self.config(), yaml).expect("config");
        }

        fn cmd(&self) -> Command {
            let mut cmd = deploy_cmd(self.root.path());
            cmd.arg("--config").arg(self.config());
            cmd
        }
    }

    #[test]
    fn missing_webroot_aborts_before_any_repository() {
        let env = Env::new();
        env.write_config(&env.path("no-such-web"), &env.path("bin/se"));
        env.cmd()
            .arg(env.path("repo"))
            .assert()
            .failure()
            .stderr(contains("preflight failed"))
            .stderr(contains("does not exist or is not a directory"));
    }

    #[test]
    fn unknown_group_suggests_the_flag() {
        let env = Env::new();
        env.cmd()
            .args(["-g", "nobody-here"])
            .arg(env.path("repo"))
            .assert()
            .failure()
            .stderr(contains("either use --group"));
    }

    #[test]
    fn missing_build_tool_is_reported_with_hint() {
        let env = Env::new();
        env.write_config(&env.path("web"), &env.path("bin/no-se"));
        env.cmd()
            .arg(env.path("repo"))
            .assert()
            .failure()
            .stderr(contains("Standard Ebooks tools seem to be missing"));
    }

    #[test]
    fn missing_build_tool_is_fine_without_build_and_catalogs_still_run() {
        let env = Env::new();
        env.write_config(&env.path("web"), &env.path("bin/no-se"));
        let repo = env.path("draft");
        fs::create_dir_all(repo.join("src/epub")).expect("mkdir");
        fs::write(
            repo.join("src/epub/content.opf"),
            "<package><metadata><dc:date>1900-01-01T00:00:00Z</dc:date></metadata></package>",
        )
        .expect("opf");

        env.cmd()
            .arg("--no-build")
            .arg(&repo)
            .assert()
            .success()
            .stdout(contains("draft"))
            .stdout(contains("OPDS and RSS catalogs regenerated"));
    }

    #[test]
    fn failed_repository_gives_non_zero_exit() {
        let env = Env::new();
        env.cmd()
            .arg(env.path("not-a-repo"))
            .assert()
            .failure()
            .stdout(contains("invalid repository root"))
            .stderr(contains("1 of 1 repositories failed"));
    }

    #[test]
    fn git_metadata_in_repository_list_is_ignored() {
        let env = Env::new();
        env.cmd()
            .arg(env.path(".git"))
            .assert()
            .success()
            .stdout(contains("No repositories to deploy."));
    }
}
