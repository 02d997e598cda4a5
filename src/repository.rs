//! # Repository Management
//!
//! This module provides the `RepositoryManager`, the registry-aware entry
//! point for everything the publisher needs from source repositories:
//! snapshots at a revision, first-parent diffs, revision ranges and fetches.
//!
//! ## Design
//!
//! Version-control access sits behind the **`RepositoryBackend`** trait. The
//! main application uses `GitBackend`, which drives the system `git` command
//! against a bare mirror. Tests and embedders use `MemoryBackend`, an
//! in-memory commit history, to exercise the whole publish pipeline without
//! touching the filesystem.
//!
//! The manager maps repository identifiers to backends. It is seeded from the
//! `repositories` namespace of the [`Registry`] and can be extended at runtime.

use crate::config::ServerSettings;
use crate::diff::{ChangeKind, DiffSet};
use crate::error::{Error, Result};
use crate::fanout;
use crate::git::{self, CommitInfo, GitSnapshot};
use crate::registry::{Registry, REPOSITORIES};
use crate::snapshot::{MemorySnapshot, Snapshot};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Access to one source repository's history.
pub trait RepositoryBackend: Send + Sync {
    /// Immutable view of the tree at `revision`.
    fn open_snapshot(&self, revision: &str) -> Result<Arc<dyn Snapshot>>;

    /// Paths changed by `revision` relative to its first parent.
    fn changes(&self, revision: &str) -> Result<DiffSet>;

    /// First-parent revisions after `since` up to the head, oldest first.
    fn revisions(&self, since: Option<&str>) -> Result<Vec<String>>;

    /// Current head revision.
    fn latest(&self) -> Result<String>;

    /// Bring the local copy up to date with its origin.
    fn fetch(&self) -> Result<()>;

    /// Author and message of `revision`.
    fn commit_info(&self, revision: &str) -> Result<CommitInfo>;
}

/// Backend over a bare git mirror.
#[derive(Debug, Clone)]
pub struct GitBackend {
    location: PathBuf,
}

impl GitBackend {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl RepositoryBackend for GitBackend {
    fn open_snapshot(&self, revision: &str) -> Result<Arc<dyn Snapshot>> {
        let revision = git::rev_parse(&self.location, revision)?;
        Ok(Arc::new(GitSnapshot::new(&self.location, revision)))
    }

    fn changes(&self, revision: &str) -> Result<DiffSet> {
        git::changes(&self.location, revision)
    }

    fn revisions(&self, since: Option<&str>) -> Result<Vec<String>> {
        git::rev_list(&self.location, since)
    }

    fn latest(&self) -> Result<String> {
        git::rev_parse(&self.location, "HEAD")
    }

    fn fetch(&self) -> Result<()> {
        git::fetch_master(&self.location)
    }

    fn commit_info(&self, revision: &str) -> Result<CommitInfo> {
        git::commit_info(&self.location, revision)
    }
}

#[derive(Debug, Clone)]
struct MemoryCommit {
    id: String,
    tree: MemorySnapshot,
    changes: DiffSet,
    info: CommitInfo,
}

/// Linear in-memory history.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    name: String,
    commits: Mutex<Vec<MemoryCommit>>,
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            commits: Mutex::new(Vec::new()),
        }
    }

    fn commits(&self) -> Result<std::sync::MutexGuard<'_, Vec<MemoryCommit>>> {
        self.commits.lock().map_err(|_| Error::LockPoisoned {
            context: format!("memory backend {}", self.name),
        })
    }

    /// Record a commit writing (`Some`) or deleting (`None`) files.
    ///
    /// Returns the new revision id, `<name>-<n>`.
    pub fn commit(&self, files: &[(&str, Option<&str>)], message: &str) -> Result<String> {
        let mut commits = self.commits()?;
        let id = format!("{}-{}", self.name, commits.len() + 1);
        let mut tree = commits
            .last()
            .map(|c| c.tree.at_revision(id.as_str()))
            .unwrap_or_else(|| MemorySnapshot::new(id.as_str()));

        let mut changes = DiffSet::new();
        for (path, content) in files {
            match content {
                Some(content) => {
                    let kind = match tree.read_optional(path)? {
                        Some(_) => ChangeKind::Modified,
                        None => ChangeKind::Added,
                    };
                    tree.add_file(path, *content);
                    changes.insert(*path, kind);
                }
                None => {
                    if tree.remove_file(path).is_some() {
                        changes.insert(*path, ChangeKind::Deleted);
                    }
                }
            }
        }

        commits.push(MemoryCommit {
            id: id.clone(),
            tree,
            changes,
            info: CommitInfo {
                name: "Tester".to_string(),
                email: "tester@example.com".to_string(),
                message: message.to_string(),
            },
        });
        Ok(id)
    }

    fn find(&self, revision: &str) -> Result<MemoryCommit> {
        let commits = self.commits()?;
        let commit = if revision == "HEAD" {
            commits.last()
        } else {
            commits.iter().find(|c| c.id == revision)
        };
        commit.cloned().ok_or_else(|| Error::NotFound {
            path: revision.to_string(),
            revision: self.name.clone(),
        })
    }
}

impl RepositoryBackend for MemoryBackend {
    fn open_snapshot(&self, revision: &str) -> Result<Arc<dyn Snapshot>> {
        Ok(Arc::new(self.find(revision)?.tree))
    }

    fn changes(&self, revision: &str) -> Result<DiffSet> {
        Ok(self.find(revision)?.changes)
    }

    fn revisions(&self, since: Option<&str>) -> Result<Vec<String>> {
        let commits = self.commits()?;
        let start = match since {
            Some(since) => {
                commits
                    .iter()
                    .position(|c| c.id == since)
                    .ok_or_else(|| Error::NotFound {
                        path: since.to_string(),
                        revision: self.name.clone(),
                    })?
                    + 1
            }
            None => 0,
        };
        Ok(commits[start..].iter().map(|c| c.id.clone()).collect())
    }

    fn latest(&self) -> Result<String> {
        Ok(self.find("HEAD")?.id)
    }

    fn fetch(&self) -> Result<()> {
        Ok(())
    }

    fn commit_info(&self, revision: &str) -> Result<CommitInfo> {
        Ok(self.find(revision)?.info)
    }
}

/// Registry-aware map from repository identifier to backend.
pub struct RepositoryManager {
    registry: Registry,
    backends: RwLock<BTreeMap<String, Arc<dyn RepositoryBackend>>>,
    concurrency: usize,
}

impl RepositoryManager {
    pub fn new(registry: Registry, concurrency: usize) -> Self {
        Self {
            registry,
            backends: RwLock::new(BTreeMap::new()),
            concurrency,
        }
    }

    /// Create a manager with a `GitBackend` for every registered location.
    pub fn from_registry(registry: Registry, concurrency: usize) -> Result<Self> {
        let manager = Self::new(registry, concurrency);
        for (repo, location) in manager.registry.entries(REPOSITORIES)? {
            manager.insert(&repo, Arc::new(GitBackend::new(location)))?;
        }
        Ok(manager)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn insert(&self, repo: &str, backend: Arc<dyn RepositoryBackend>) -> Result<()> {
        self.backends
            .write()
            .map_err(|_| Error::LockPoisoned {
                context: "repository backends".to_string(),
            })?
            .insert(repo.to_string(), backend);
        Ok(())
    }

    /// Register a backend under `repo` for this process.
    ///
    /// Registration is only persisted through [`RepositoryManager::configure`].
    pub fn register(&self, repo: &str, backend: Arc<dyn RepositoryBackend>) -> Result<()> {
        self.insert(repo, backend)
    }

    /// Backend of `repo`, if registered.
    pub fn get(&self, repo: &str) -> Result<Option<Arc<dyn RepositoryBackend>>> {
        Ok(self
            .backends
            .read()
            .map_err(|_| Error::LockPoisoned {
                context: "repository backends".to_string(),
            })?
            .get(repo)
            .cloned())
    }

    /// Backend of `repo`; unknown identifiers are an error.
    pub fn backend(&self, repo: &str) -> Result<Arc<dyn RepositoryBackend>> {
        self.get(repo)?.ok_or_else(|| Error::RepositoryNotFound {
            repo: repo.to_string(),
        })
    }

    pub fn repositories(&self) -> Result<Vec<String>> {
        Ok(self
            .backends
            .read()
            .map_err(|_| Error::LockPoisoned {
                context: "repository backends".to_string(),
            })?
            .keys()
            .cloned()
            .collect())
    }

    /// Fetch every listed repository, at most `concurrency` at once.
    pub fn fetch_all(&self, repos: &[String]) -> Result<()> {
        fanout::try_map(self.concurrency, repos, |repo| {
            info!("Fetching {}", repo);
            self.backend(repo)?.fetch()
        })?;
        Ok(())
    }

    /// Mirror-clone every configured source repository that is not present
    /// yet and register all of them. Returns the registered identifiers.
    pub fn configure(&self, settings: &ServerSettings) -> Result<Vec<String>> {
        let repos = settings.repo_ids();
        fanout::try_map(self.concurrency, &repos, |repo| {
            let mirror = settings.mirror_path(repo);
            if mirror.exists() {
                info!("{} is already mirrored", repo);
            } else {
                info!("Cloning {}...", repo);
                git::clone_mirror(&settings.clone_url(&format!("{}.git", repo)), &mirror)?;
            }
            Ok(())
        })?;

        for repo in &repos {
            let mirror = settings.mirror_path(repo);
            if !mirror.exists() {
                warn!("Mirror of {} is missing at {}", repo, mirror.display());
                continue;
            }
            self.registry.set_location(repo, &mirror)?;
            self.insert(repo, Arc::new(GitBackend::new(mirror)))?;
        }
        Ok(repos)
    }
}
