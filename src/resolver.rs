//! # Bundle Resolution
//!
//! Turns a bundle name into its published content.
//!
//! ## Leaf list
//!
//! The bundle's patterns are applied in declaration order to one
//! [`OrderedSet`] of leaf paths:
//!
//! - a literal pattern names a single leaf;
//! - a wildcard pattern is expanded against the snapshot, walking only the
//!   subtree below its fixed directory prefix and keeping matching files in
//!   path order;
//! - inclusions append leaves not yet present, exclusions remove them, so a
//!   later inclusion re-adds a leaf at the end.
//!
//! ## Leaf content
//!
//! Each leaf, in order, is one of:
//!
//! - an `ext` entry: resolved in the owning repository's latest snapshot with
//!   that repository's own manifest, then tagged `/* from <repo>:<uri> */`;
//! - another bundle of the same repository: resolved recursively and inlined;
//! - a plain file: read from the snapshot and passed through the
//!   repository's preprocessor [`Pipeline`] unless it is binary.
//!
//! Text pieces are joined with `\n`. A binary leaf must be the only leaf of
//! its bundle. Cycles are detected on the chain of bundles currently being
//! resolved, so two siblings may share a nested bundle.

use crate::error::{Error, Result};
use crate::manifest::BundleConfig;
use crate::ordered_set::OrderedSet;
use crate::pattern::BundlePattern;
use crate::preprocess::Pipeline;
use crate::snapshot::Snapshot;
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// Extensions always treated as binary, lowercase.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "woff", "woff2",
    "ttf", "otf", "eot", "swf", "mp3", "mp4", "ogg", "wav", "webm", "pdf", "zip", "gz", "tgz",
    "bz2", "7z", "rar", "jar", "exe", "dll", "so", "dylib", "wasm",
];

/// How many leading bytes the NUL heuristic inspects.
const SNIFF_LEN: usize = 8000;

/// Whether a leaf should be published verbatim instead of as text.
pub fn is_binary(path: &str, content: &[u8]) -> bool {
    let by_extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    by_extension
        || content[..content.len().min(SNIFF_LEN)].contains(&0)
        || std::str::from_utf8(content).is_err()
}

/// Resolved content of one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn is_binary(&self) -> bool {
        matches!(self, Content::Binary(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }
}

/// Everything needed to resolve bundles of one repository.
#[derive(Clone)]
pub struct RepoView {
    pub repo: String,
    pub snapshot: Arc<dyn Snapshot>,
    pub config: Arc<BundleConfig>,
    pub pipeline: Arc<Pipeline>,
}

impl RepoView {
    pub fn new(repo: &str, snapshot: Arc<dyn Snapshot>, config: Arc<BundleConfig>) -> Self {
        Self {
            repo: repo.to_string(),
            snapshot,
            config,
            pipeline: Arc::new(Pipeline::empty()),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Access to other repositories for external references.
pub trait ExternalSource: Send + Sync {
    /// Latest published view of `repo`, or `None` if it is not registered.
    fn checkout(&self, repo: &str) -> Result<Option<RepoView>>;
}

/// Source that knows no other repository.
pub struct NoExternals;

impl ExternalSource for NoExternals {
    fn checkout(&self, _repo: &str) -> Result<Option<RepoView>> {
        Ok(None)
    }
}

/// One `(repository, bundle)` frame of the resolution chain.
type Frame = (String, String);

pub struct Resolver<'a> {
    externals: &'a dyn ExternalSource,
}

impl<'a> Resolver<'a> {
    pub fn new(externals: &'a dyn ExternalSource) -> Self {
        Self { externals }
    }

    /// Resolve `bundle` of `view` into content.
    pub fn resolve(&self, bundle: &str, view: &RepoView) -> Result<Content> {
        let mut chain = Vec::new();
        self.resolve_in_chain(bundle, view, &mut chain)
    }

    /// Flattened leaf list of `bundle`, before nested bundles are expanded.
    ///
    /// A name that is not a bundle is its own single leaf.
    pub fn leaves(&self, bundle: &str, view: &RepoView) -> Result<Vec<String>> {
        let Some(patterns) = view.config.bundle(bundle) else {
            return Ok(vec![bundle.to_string()]);
        };

        let mut leaves = OrderedSet::new();
        for pattern in patterns.patterns() {
            let matched = expand(pattern, view).map_err(|e| resolution(view, bundle, e))?;
            for leaf in matched {
                if pattern.is_exclusion() {
                    leaves.remove(&leaf);
                } else {
                    leaves.insert(leaf);
                }
            }
        }
        Ok(leaves.into_vec())
    }

    fn resolve_in_chain(
        &self,
        bundle: &str,
        view: &RepoView,
        chain: &mut Vec<Frame>,
    ) -> Result<Content> {
        let frame = (view.repo.clone(), bundle.to_string());
        if let Some(start) = chain.iter().position(|f| *f == frame) {
            let cycle: Vec<String> = chain[start..]
                .iter()
                .chain(std::iter::once(&frame))
                .map(|(repo, bundle)| format!("{}:{}", repo, bundle))
                .collect();
            return Err(Error::CycleDetected {
                cycle: cycle.join(" -> "),
            });
        }

        chain.push(frame);
        let result = self.concatenate(bundle, view, chain);
        chain.pop();
        result
    }

    fn concatenate(&self, bundle: &str, view: &RepoView, chain: &mut Vec<Frame>) -> Result<Content> {
        let leaves = self.leaves(bundle, view)?;
        debug!("{}:{} has {} leaves", view.repo, bundle, leaves.len());

        let mut pieces = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            let piece = self.resolve_leaf(bundle, leaf, view, chain)?;
            if piece.is_binary() && leaves.len() > 1 {
                return Err(Error::Resolution {
                    repo: view.repo.clone(),
                    bundle: bundle.to_string(),
                    message: format!("binary leaf {} must be the only leaf of its bundle", leaf),
                });
            }
            pieces.push(piece);
        }

        if pieces.len() == 1 && pieces[0].is_binary() {
            return Ok(pieces.remove(0));
        }
        let texts: Vec<String> = pieces
            .into_iter()
            .map(|piece| match piece {
                Content::Text(text) => text,
                Content::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            })
            .collect();
        Ok(Content::Text(texts.join("\n")))
    }

    fn resolve_leaf(
        &self,
        bundle: &str,
        leaf: &str,
        view: &RepoView,
        chain: &mut Vec<Frame>,
    ) -> Result<Content> {
        if let Some(external) = view.config.external(leaf) {
            let target = self
                .externals
                .checkout(&external.repo)?
                .ok_or_else(|| Error::ExternalReference {
                    path: leaf.to_string(),
                    target_repo: external.repo.clone(),
                    uri: external.uri.clone(),
                    message: format!("Repository {} doesn't exist", external.repo),
                })?;
            return Ok(match self.resolve_in_chain(&external.uri, &target, chain)? {
                Content::Text(text) => Content::Text(format!(
                    "/* from {}:{} */\n{}",
                    external.repo, external.uri, text
                )),
                binary => binary,
            });
        }

        if leaf != bundle && view.config.is_bundle(leaf) {
            return self.resolve_in_chain(leaf, view, chain);
        }

        let bytes = view
            .snapshot
            .read_file(leaf)
            .map_err(|e| resolution(view, bundle, e))?;
        if is_binary(leaf, &bytes) {
            return Ok(Content::Binary(bytes));
        }
        let text = String::from_utf8(bytes).map_err(|e| resolution(view, bundle, e))?;
        Ok(Content::Text(view.pipeline.run(leaf, text)))
    }
}

/// Expand one pattern into the leaf paths it names.
fn expand(pattern: &BundlePattern, view: &RepoView) -> Result<Vec<String>> {
    if pattern.is_literal() {
        return Ok(vec![pattern.glob().to_string()]);
    }
    let entries = view.snapshot.list_subtree(pattern.root_dir())?;
    Ok(entries
        .into_iter()
        .filter(|entry| !entry.is_dir && pattern.matches(&entry.path))
        .map(|entry| entry.path)
        .collect())
}

fn resolution(view: &RepoView, bundle: &str, cause: impl std::fmt::Display) -> Error {
    Error::Resolution {
        repo: view.repo.clone(),
        bundle: bundle.to_string(),
        message: cause.to_string(),
    }
}
