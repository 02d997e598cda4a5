//! Read-only views of a repository tree at one revision
//!
//! The resolver only ever reads from a [`Snapshot`]. The git-backed
//! implementation lives in [`crate::git`]; [`MemorySnapshot`] keeps a whole
//! tree in memory.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// One entry of a listed subtree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TreeEntry {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub is_dir: bool,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }
}

/// An immutable view of a repository's files at one revision.
pub trait Snapshot: Send + Sync {
    /// Identifier of the revision this snapshot was taken at.
    fn revision(&self) -> &str;

    /// Read a file's bytes. Fails with `IsDirectory` or `NotFound`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// List every entry below `dir` recursively, sorted by path.
    ///
    /// An empty `dir` lists the whole tree. A missing directory yields an
    /// empty listing.
    fn list_subtree(&self, dir: &str) -> Result<Vec<TreeEntry>>;

    /// Read a file that may legitimately be absent.
    fn read_optional(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.read_file(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches("./").trim_matches('/')
}

fn under<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    path.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

/// Snapshot holding every file in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    revision: String,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySnapshot {
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            files: BTreeMap::new(),
        }
    }

    /// Add or replace a file
    pub fn add_file(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize(path).to_string(), content.into());
    }

    /// Builder-style variant of [`MemorySnapshot::add_file`]
    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn remove_file(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(normalize(path))
    }

    /// Copy of this tree under a new revision id
    pub fn at_revision(&self, revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            files: self.files.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.files.keys().any(|file| under(file, path).is_some())
    }
}

impl Snapshot for MemorySnapshot {
    fn revision(&self) -> &str {
        &self.revision
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path);
        if let Some(content) = self.files.get(path) {
            return Ok(content.clone());
        }
        if self.is_dir(path) {
            return Err(Error::IsDirectory {
                path: path.to_string(),
                revision: self.revision.clone(),
            });
        }
        Err(Error::NotFound {
            path: path.to_string(),
            revision: self.revision.clone(),
        })
    }

    fn list_subtree(&self, dir: &str) -> Result<Vec<TreeEntry>> {
        let dir = normalize(dir);
        let mut entries = std::collections::BTreeSet::new();
        for file in self.files.keys() {
            let Some(rest) = under(file, dir) else {
                continue;
            };
            // Intermediate directories between `dir` and the file
            let mut prefix = dir.to_string();
            let components: Vec<&str> = rest.split('/').collect();
            for component in &components[..components.len() - 1] {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(component);
                entries.insert(TreeEntry::dir(prefix.clone()));
            }
            entries.insert(TreeEntry::file(file.clone()));
        }
        Ok(entries.into_iter().collect())
    }
}
