//! Delivery of resolved bundles to the publish target
//!
//! A [`PublishRequest`] carries every output of one changeset: resolved
//! content for bundles to write and `None` for bundles to delete. Paths are
//! relative to the source repository root; the transport maps them below the
//! repository's `mapping_dir` after stripping its `publish_dir`.

use crate::error::{Error, Result};
use crate::git::{self, Identity};
use crate::session::ProgressSink;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Everything published for one changeset of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub repo: String,
    /// Output path -> content, `None` deletes the output
    pub files: BTreeMap<String, Option<Vec<u8>>>,
    pub author: Identity,
    pub message: String,
    pub publish_dir: Option<String>,
    pub mapping_dir: Option<String>,
}

impl PublishRequest {
    /// Target path of `path` below the mapping directory.
    pub fn target_path(&self, path: &str) -> Result<PathBuf> {
        let mapping_dir = self
            .mapping_dir
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| Error::Transport {
                message: format!("mapping_dir is not configured for {}", self.repo),
            })?;

        let relative = match self.publish_dir.as_deref().map(|d| d.trim_end_matches('/')) {
            Some(dir) if !dir.is_empty() && dir != "." => path
                .strip_prefix(dir)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path),
            _ => path,
        };

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Transport {
                message: format!("{} escapes the mapping directory", path),
            });
        }
        Ok(Path::new(mapping_dir).join(relative))
    }
}

/// Outcome of a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// New commit in the publish target; `None` when nothing changed
    pub commit: Option<String>,
    pub written: Vec<String>,
    pub deleted: Vec<String>,
}

/// A publish target.
pub trait Transport: Send + Sync {
    fn deliver(&self, request: &PublishRequest, progress: &dyn ProgressSink) -> Result<Receipt>;
}

/// Publishes into a git working copy and commits there.
///
/// Every repository publishes into the same working copy, so deliveries are
/// serialized: one request is written, staged and committed before the next
/// one touches the index.
#[derive(Debug)]
pub struct GitWorkingCopy {
    root: PathBuf,
    committer: Identity,
    push: bool,
    index: Mutex<()>,
}

impl GitWorkingCopy {
    pub fn new(root: impl Into<PathBuf>, committer: Identity, push: bool) -> Self {
        Self {
            root: root.into(),
            committer,
            push,
            index: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Transport for GitWorkingCopy {
    fn deliver(&self, request: &PublishRequest, progress: &dyn ProgressSink) -> Result<Receipt> {
        if !self.root.join(".git").exists() {
            return Err(Error::Transport {
                message: format!("{} is not a git working copy", self.root.display()),
            });
        }

        let pathspec = request
            .mapping_dir
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| Error::Transport {
                message: format!("mapping_dir is not configured for {}", request.repo),
            })?;

        let _index = self.index.lock().map_err(|_| Error::LockPoisoned {
            context: format!("working copy {}", self.root.display()),
        })?;

        let mut receipt = Receipt::default();
        for (path, content) in &request.files {
            let target = request.target_path(path)?;
            let full = self.root.join(&target);
            match content {
                Some(bytes) => {
                    progress.message(&format!("Copying {}...", path));
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&full, bytes)?;
                    receipt.written.push(path.clone());
                }
                None => {
                    progress.message(&format!("Deleting {}...", path));
                    if full.exists() {
                        fs::remove_file(&full)?;
                    }
                    receipt.deleted.push(path.clone());
                }
            }
        }

        fs::create_dir_all(self.root.join(pathspec))?;
        debug!("Staging {} in {}", pathspec, self.root.display());
        git::add_all(&self.root, pathspec)?;

        let staged = git::staged_paths(&self.root, pathspec)?;
        if staged.is_empty() {
            progress.message("Files have been committed already.");
            return Ok(receipt);
        }
        for path in &staged {
            progress.message(&format!("Committing {}", path));
        }

        let commit = git::commit(
            &self.root,
            pathspec,
            &request.author,
            &self.committer,
            &request.message,
        )?;
        if self.push {
            git::push(&self.root)?;
        }
        info!("Committed {} for {}", commit, request.repo);
        progress.message(&format!("Committed {}", commit));
        receipt.commit = Some(commit);
        Ok(receipt)
    }
}

/// Keeps every request in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<PublishRequest>>,
    fail_on: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport rejecting any request that contains `path`.
    pub fn failing_on(path: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_on: Some(path.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, request: &PublishRequest, progress: &dyn ProgressSink) -> Result<Receipt> {
        if let Some(path) = &self.fail_on {
            if request.files.contains_key(path) {
                return Err(Error::Transport {
                    message: format!("refusing to publish {}", path),
                });
            }
        }
        let mut receipt = Receipt::default();
        for (path, content) in &request.files {
            // Validates the mapping like a real delivery would
            request.target_path(path)?;
            match content {
                Some(_) => receipt.written.push(path.clone()),
                None => receipt.deleted.push(path.clone()),
            }
        }
        progress.message(&format!("Recorded {} outputs of {}", request.files.len(), request.repo));
        let mut requests = self.requests.lock().map_err(|_| Error::LockPoisoned {
            context: "recording transport".to_string(),
        })?;
        requests.push(request.clone());
        receipt.commit = Some(format!("recorded-{}", requests.len()));
        Ok(receipt)
    }
}
