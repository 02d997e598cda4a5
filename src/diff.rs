//! # Diff Propagation
//!
//! A [`DiffSet`] starts as the raw list of paths a changeset touched and is
//! expanded in place into the set of outputs that must be rebuilt or removed:
//!
//! 1.  **Direct match**: every bundle whose patterns net-include a changed
//!     path is marked [`ChangeKind::Affected`].
//! 2.  **Cascade**: breadth-first closure over the manifest's cascade graph.
//!     Every bundle nesting an affected bundle becomes affected too.
//! 3.  **Unmatched paths**: a changed path that no bundle includes and that
//!     is not itself a bundle name is dropped. Changed paths belonging to a
//!     bundle stay with their own kind, so a deleted source file is deleted
//!     from the target too.
//! 4.  **Scope**: with a `publish_dir`, entries outside it are dropped.
//!
//! A literal change recorded for a path always wins over the synthetic
//! marker, so a deleted bundle stays deleted. Bundles reached only through
//! propagation are never deleted, they are recomputed.

use crate::manifest::BundleConfig;
use crate::pattern::is_within;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap, HashSet, VecDeque};
use std::fmt;

/// Kind of change recorded for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// Output must be recomputed because something it contains changed
    Affected,
}

impl ChangeKind {
    /// Map a `git diff --name-status` code to a change kind.
    ///
    /// Renames and copies are split by the caller; type changes count as
    /// modifications.
    pub fn from_git_status(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(ChangeKind::Added),
            'M' | 'T' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            _ => None,
        }
    }

    pub fn is_deletion(self) -> bool {
        self == ChangeKind::Deleted
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Affected => "affected",
        };
        f.write_str(label)
    }
}

/// Working set of changed or affected paths for one publish pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSet {
    entries: BTreeMap<String, ChangeKind>,
}

impl DiffSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, replacing any previous kind for `path`.
    pub fn insert(&mut self, path: impl Into<String>, kind: ChangeKind) {
        self.entries.insert(path.into(), kind);
    }

    /// Mark `path` affected unless it already carries a status.
    ///
    /// Returns whether the path was newly added.
    pub fn mark_affected(&mut self, path: &str) -> bool {
        if self.entries.contains_key(path) {
            return false;
        }
        self.entries.insert(path.to_string(), ChangeKind::Affected);
        true
    }

    pub fn get(&self, path: &str) -> Option<ChangeKind> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<ChangeKind> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChangeKind)> {
        self.entries.iter().map(|(path, kind)| (path.as_str(), *kind))
    }

    pub fn retain<F: FnMut(&str, ChangeKind) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|path, kind| keep(path, *kind));
    }

    /// Merge another set, keeping existing statuses.
    pub fn absorb(&mut self, other: &DiffSet) {
        for (path, kind) in other.iter() {
            self.entries.entry(path.to_string()).or_insert(kind);
        }
    }
}

impl FromIterator<(String, ChangeKind)> for DiffSet {
    fn from_iter<I: IntoIterator<Item = (String, ChangeKind)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, ChangeKind)> for DiffSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, ChangeKind)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(path, kind)| (path.to_string(), kind))
            .collect()
    }
}

impl IntoIterator for DiffSet {
    type Item = (String, ChangeKind);
    type IntoIter = btree_map::IntoIter<String, ChangeKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Expand `diff` in place into the closed set of affected outputs.
pub fn propagate(diff: &mut DiffSet, config: &BundleConfig, publish_dir: Option<&str>) {
    let changed: Vec<String> = diff.paths().map(str::to_string).collect();

    for path in &changed {
        for bundle in config.bundles_including(path) {
            if diff.mark_affected(bundle) {
                debug!("{} is affected by {}", bundle, path);
            }
        }
    }

    cascade(diff, config);

    diff.retain(|path, _| {
        config.is_bundle(path) || config.bundles_including(path).next().is_some()
    });

    if let Some(dir) = publish_dir.filter(|dir| !dir.is_empty()) {
        diff.retain(|path, _| is_within(path, dir));
    }
}

/// Breadth-first closure over the cascade graph.
fn cascade(diff: &mut DiffSet, config: &BundleConfig) {
    let mut queue: VecDeque<String> = diff
        .paths()
        .filter(|path| config.is_bundle(path))
        .map(str::to_string)
        .collect();
    let mut visited: HashSet<String> = queue.iter().cloned().collect();

    while let Some(bundle) = queue.pop_front() {
        for outer in config.cascade().nesting(&bundle) {
            if !visited.insert(outer.to_string()) {
                continue;
            }
            if diff.mark_affected(outer) {
                debug!("{} is affected through nested {}", outer, bundle);
            }
            queue.push_back(outer.to_string());
        }
    }
}
