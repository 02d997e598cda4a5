//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then `use common::prelude::*;`.
//! Tests driving the real `git` binary call [`git_available`] first and
//! return early when it is missing.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::{git, git_available, settings_yaml, CliWorkspace, SourceRepo};
}

/// Whether a usable `git` binary is on the PATH.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` and return its trimmed stdout; panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A non-bare repository on `master` with a fixed identity.
pub struct SourceRepo {
    pub path: PathBuf,
}

#[allow(dead_code)]
impl SourceRepo {
    pub fn init(path: &Path) -> Self {
        fs::create_dir_all(path).unwrap();
        git(path, &["init", "-q"]);
        git(path, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        git(path, &["config", "user.name", "Alice"]);
        git(path, &["config", "user.email", "alice@example.com"]);
        git(path, &["config", "commit.gpgsign", "false"]);
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write (`Some`) or delete (`None`) files and commit; returns the id.
    pub fn commit(&self, files: &[(&str, Option<&str>)], message: &str) -> String {
        for (path, content) in files {
            let full = self.path.join(path);
            match content {
                Some(content) => {
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, content).unwrap();
                }
                None => fs::remove_file(&full).unwrap(),
            }
        }
        git(&self.path, &["add", "-A"]);
        git(&self.path, &["commit", "-q", "-m", message]);
        git(&self.path, &["rev-parse", "HEAD"])
    }
}

/// Settings mirroring `repos` from `upstream` into `workspace`.
pub fn settings_yaml(workspace: &Path, upstream: &Path, repos: &[&str]) -> String {
    format!(
        "workspace: {}\nsources:\n  url_prefix: {}/\n  repos: [{}]\ntarget:\n  path: publish\n  name: Publisher\n  email: publisher@example.com\nsession_timeout_secs: 2\n",
        workspace.display(),
        upstream.display(),
        repos.join(", ")
    )
}

/// Manifest of the `web` repository used by the CLI tests.
pub const WEB_MANIFEST: &str =
    r#"{"pkg": {"app.js": ["src/*.js"], "all.js": ["app.js", "vendor.js"]}}"#;

/// An upstream `web` repository, an empty publish target and a settings file
/// pointing at both.
#[allow(dead_code)]
pub struct CliWorkspace {
    pub temp: assert_fs::TempDir,
    pub workspace: PathBuf,
    pub settings: PathBuf,
    pub web: SourceRepo,
    /// First commit of `web`
    pub rev: String,
}

#[allow(dead_code)]
impl CliWorkspace {
    pub fn new() -> Self {
        let temp = assert_fs::TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        let workspace = temp.path().join("workspace");

        let web = SourceRepo::init(&upstream.join("web.git"));
        let rev = web.commit(
            &[
                ("concatfile.json", Some(WEB_MANIFEST)),
                (".gspconfig", Some(r#"{"mapping_dir": "web"}"#)),
                ("src/a.js", Some("a();")),
                ("vendor.js", Some("vendor();")),
            ],
            "init",
        );
        let target = SourceRepo::init(&workspace.join("publish"));
        target.commit(&[("README", Some("bundles"))], "init");

        let settings = temp.path().join("bundle-publish.yaml");
        fs::write(&settings, settings_yaml(&workspace, &upstream, &["web"])).unwrap();

        Self {
            temp,
            workspace,
            settings,
            web,
            rev,
        }
    }

    /// `bundle-publish <args> --color never --config <settings>`
    pub fn cmd(&self, args: &[&str]) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bundle-publish");
        cmd.args(args)
            .args(["--color", "never", "--config"])
            .arg(&self.settings);
        cmd
    }

    /// Mirror `web` into the workspace.
    pub fn configure(&self) {
        self.cmd(&["configure", "--fetch"]).assert().success();
    }

    /// Path of a file in the publish target.
    pub fn published(&self, path: &str) -> PathBuf {
        self.workspace.join("publish").join(path)
    }
}
