//! Git plumbing through the system `git` command
//!
//! Using the system binary means SSH keys, credential helpers and everything
//! else configured in `~/.gitconfig` apply to mirror clones and pushes
//! without extra setup.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::diff::{ChangeKind, DiffSet};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, TreeEntry};
use log::debug;

/// Run git in `dir` and return its raw stdout.
fn run<I, S>(dir: &Path, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let command = args
        .iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    debug!("git {} (in {})", command, dir.display());

    let output = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: command.clone(),
            location: dir.display().to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command,
            location: dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn run_text<I, S>(dir: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Ok(String::from_utf8_lossy(&run(dir, args)?).into_owned())
}

/// Whether a usable `git` binary is on the PATH.
pub fn is_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Create a bare mirror of `url` at `target`.
pub fn clone_mirror(url: &str, target: &Path) -> Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    run(parent, [OsStr::new("clone"), OsStr::new("--mirror"), OsStr::new(url), target.as_os_str()])
        .map_err(|e| match e {
            Error::GitCommand { stderr, .. }
                if stderr.contains("Authentication failed")
                    || stderr.contains("Permission denied")
                    || stderr.contains("Could not read from remote repository") =>
            {
                Error::GitCommand {
                    command: format!("clone --mirror {}", url),
                    location: parent.display().to_string(),
                    stderr: format!(
                        "Authentication failed. Make sure you have access to the repository.\n{}",
                        stderr
                    ),
                }
            }
            other => other,
        })?;
    Ok(())
}

/// Update the `master` branch of a mirror from its origin.
pub fn fetch_master(repo_dir: &Path) -> Result<()> {
    run(repo_dir, ["fetch", "origin", "master:master"])?;
    Ok(())
}

/// Full object id of `rev`.
pub fn rev_parse(repo_dir: &Path, rev: &str) -> Result<String> {
    Ok(run_text(repo_dir, ["rev-parse", "--verify", format!("{}^{{commit}}", rev).as_str()])?
        .trim()
        .to_string())
}

/// First-parent revisions after `since` up to HEAD, oldest first.
///
/// Without `since` the whole first-parent history is listed.
pub fn rev_list(repo_dir: &Path, since: Option<&str>) -> Result<Vec<String>> {
    let range = match since {
        Some(since) => format!("{}..HEAD", since),
        None => "HEAD".to_string(),
    };
    let stdout = run_text(repo_dir, ["rev-list", "--reverse", "--first-parent", range.as_str()])?;
    Ok(stdout.split_whitespace().map(str::to_string).collect())
}

/// Paths changed by `rev` relative to its first parent.
pub fn changes(repo_dir: &Path, rev: &str) -> Result<DiffSet> {
    let parent = format!("{}^1", rev);
    let stdout = match run(repo_dir, ["rev-parse", "--verify", "-q", parent.as_str()]) {
        Ok(_) => run(
            repo_dir,
            ["diff-tree", "-r", "-z", "--name-status", "--no-renames", parent.as_str(), rev],
        )?,
        // Root commit
        Err(_) => run(
            repo_dir,
            ["diff-tree", "-r", "-z", "--root", "--no-commit-id", "--name-status", "--no-renames", rev],
        )?,
    };
    Ok(parse_name_status(&String::from_utf8_lossy(&stdout)))
}

/// Parse `--name-status -z` output.
fn parse_name_status(raw: &str) -> DiffSet {
    let mut diff = DiffSet::new();
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());
    while let (Some(status), Some(path)) = (fields.next(), fields.next()) {
        match ChangeKind::from_git_status(status) {
            Some(kind) => diff.insert(path, kind),
            None => debug!("Ignoring change {} on {}", status, path),
        }
    }
    diff
}

/// Author of a commit and its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub fn commit_info(repo_dir: &Path, rev: &str) -> Result<CommitInfo> {
    let stdout = run_text(repo_dir, ["log", "-1", "--format=%an%x00%ae%x00%B", rev])?;
    let mut parts = stdout.splitn(3, '\0');
    Ok(CommitInfo {
        name: parts.next().unwrap_or_default().to_string(),
        email: parts.next().unwrap_or_default().to_string(),
        message: parts.next().unwrap_or_default().trim_end().to_string(),
    })
}

/// One line of `ls-tree -z` output.
fn parse_ls_tree_entry(line: &str) -> Option<(&str, &str, &str)> {
    let (meta, path) = line.split_once('\t')?;
    let mut meta = meta.split(' ');
    let _mode = meta.next()?;
    let kind = meta.next()?;
    let object = meta.next()?;
    Some((kind, object, path))
}

/// A commit of a (usually bare) repository read through `git`.
#[derive(Debug, Clone)]
pub struct GitSnapshot {
    repo_dir: PathBuf,
    revision: String,
}

impl GitSnapshot {
    pub fn new(repo_dir: impl Into<PathBuf>, revision: impl Into<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            revision: revision.into(),
        }
    }
}

impl Snapshot for GitSnapshot {
    fn revision(&self) -> &str {
        &self.revision
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = path.trim_start_matches("./").trim_matches('/');
        let listing = run_text(&self.repo_dir, ["ls-tree", "-z", self.revision.as_str(), "--", path])?;
        let entry = listing
            .split('\0')
            .filter_map(parse_ls_tree_entry)
            .find(|(_, _, p)| *p == path);

        match entry {
            Some(("tree", _, _)) => Err(Error::IsDirectory {
                path: path.to_string(),
                revision: self.revision.clone(),
            }),
            Some((_, object, _)) => run(&self.repo_dir, ["cat-file", "blob", object]),
            None => Err(Error::NotFound {
                path: path.to_string(),
                revision: self.revision.clone(),
            }),
        }
    }

    fn list_subtree(&self, dir: &str) -> Result<Vec<TreeEntry>> {
        let dir = dir.trim_start_matches("./").trim_matches('/');
        let mut args = vec!["ls-tree", "-r", "-t", "-z", self.revision.as_str()];
        if !dir.is_empty() {
            args.extend(["--", dir]);
        }
        let listing = run_text(&self.repo_dir, args)?;
        let mut entries: Vec<TreeEntry> = listing
            .split('\0')
            .filter_map(parse_ls_tree_entry)
            .filter(|(_, _, path)| *path != dir)
            .map(|(kind, _, path)| TreeEntry {
                path: path.to_string(),
                is_dir: kind == "tree",
            })
            .collect();
        entries.sort();
        Ok(entries)
    }
}

/// Stage everything below `pathspec` in a working copy.
pub fn add_all(work_dir: &Path, pathspec: &str) -> Result<()> {
    run(work_dir, ["add", "-A", "--", pathspec])?;
    Ok(())
}

/// Paths staged for commit below `pathspec`.
pub fn staged_paths(work_dir: &Path, pathspec: &str) -> Result<Vec<String>> {
    let stdout = run_text(work_dir, ["diff", "--cached", "--name-only", "-z", "--", pathspec])?;
    Ok(stdout
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect())
}

/// Identity used for a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Commit what is staged below `pathspec` with separate author and
/// committer; returns the new id.
///
/// Changes staged outside `pathspec` stay in the index.
pub fn commit(
    work_dir: &Path,
    pathspec: &str,
    author: &Identity,
    committer: &Identity,
    message: &str,
) -> Result<String> {
    run(
        work_dir,
        [
            "-c".to_string(),
            format!("user.name={}", committer.name),
            "-c".to_string(),
            format!("user.email={}", committer.email),
            "-c".to_string(),
            "commit.gpgsign=false".to_string(),
            "commit".to_string(),
            "-q".to_string(),
            format!("--author={} <{}>", author.name, author.email),
            "-m".to_string(),
            message.to_string(),
            "--".to_string(),
            pathspec.to_string(),
        ],
    )?;
    rev_parse(work_dir, "HEAD")
}

/// Push the current branch to `origin`.
pub fn push(work_dir: &Path) -> Result<()> {
    run(work_dir, ["push", "origin", "HEAD"])?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Initialise a repository on `master` with a fixed identity.
    pub fn init_repo(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        run(dir, ["init", "-q"]).unwrap();
        run(dir, ["symbolic-ref", "HEAD", "refs/heads/master"]).unwrap();
        run(dir, ["config", "user.name", "Tester"]).unwrap();
        run(dir, ["config", "user.email", "tester@example.com"]).unwrap();
        run(dir, ["config", "commit.gpgsign", "false"]).unwrap();
    }

    /// Write files (None deletes) and commit them; returns the commit id.
    pub fn commit_files(dir: &Path, files: &[(&str, Option<&str>)], message: &str) -> String {
        for (path, content) in files {
            let full = dir.join(path);
            match content {
                Some(content) => {
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, content).unwrap();
                }
                None => fs::remove_file(&full).unwrap(),
            }
        }
        run(dir, ["add", "-A"]).unwrap();
        run(dir, ["commit", "-q", "-m", message]).unwrap();
        rev_parse(dir, "HEAD").unwrap()
    }

    /// Run git and return its stdout as text.
    pub fn git_output(dir: &Path, args: &[&str]) -> String {
        run_text(dir, args).unwrap()
    }
}
