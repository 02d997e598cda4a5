//! # Bundle Manifest
//!
//! Every source repository describes its bundles in a JSON manifest
//! (`concatfile.json`) at the repository root:
//!
//! ```json
//! {
//!     "pkg": {
//!         "app.js": ["src/*.js", "!src/debug.js"],
//!         "vendor.js": "vendor/*.js"
//!     },
//!     "ext": {
//!         "vendor/shared.js": { "repo": "common", "uri": "lib/shared.js" }
//!     }
//! }
//! ```
//!
//! - **`pkg`** maps a bundle name (the output path) to one pattern or an
//!   ordered list of patterns. A leading `!` marks an exclusion.
//! - **`ext`** maps a leaf path to a file (or bundle) owned by another
//!   repository.
//!
//! Parsing produces a [`BundleConfig`], including the derived cascade graph:
//! for each bundle, the other bundles whose patterns net-match its name and
//! therefore nest it.

use crate::error::{Error, Result};
use crate::pattern::PatternList;
use crate::snapshot::Snapshot;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Location of the manifest inside a repository.
pub const MANIFEST_FILE: &str = "concatfile.json";

/// A leaf owned by another repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    /// Identifier of the owning repository
    pub repo: String,
    /// Path (or bundle name) inside the owning repository
    pub uri: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(pattern) => vec![pattern],
            OneOrMany::Many(patterns) => patterns,
        }
    }
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    pkg: BTreeMap<String, OneOrMany>,
    #[serde(default)]
    ext: BTreeMap<String, ExternalRef>,
}

/// Reverse-dependency adjacency over bundle names.
///
/// Bundles are interned into an arena; `nesting[i]` lists the bundles whose
/// pattern lists include bundle `i`'s name.
#[derive(Debug, Clone, Default)]
pub struct CascadeGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    nesting: Vec<Vec<usize>>,
}

impl CascadeGraph {
    fn build(entries: &BTreeMap<String, PatternList>) -> Self {
        let names: Vec<String> = entries.keys().cloned().collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut nesting = vec![Vec::new(); names.len()];
        for (nested, name) in names.iter().enumerate() {
            for (outer, patterns) in entries.values().enumerate() {
                // A bundle never cascades into itself
                if outer != nested && patterns.includes(name) {
                    nesting[nested].push(outer);
                }
            }
        }

        Self {
            names,
            index,
            nesting,
        }
    }

    /// Bundles that nest `bundle` directly.
    pub fn nesting(&self, bundle: &str) -> impl Iterator<Item = &str> {
        let ids = self
            .index
            .get(bundle)
            .map(|&i| self.nesting[i].as_slice())
            .unwrap_or(&[]);
        ids.iter().map(move |&i| self.names[i].as_str())
    }

    /// Number of nesting edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.nesting.iter().map(Vec::len).sum()
    }
}

/// Parsed manifest of one repository.
#[derive(Debug, Clone, Default)]
pub struct BundleConfig {
    entries: BTreeMap<String, PatternList>,
    externals: BTreeMap<String, ExternalRef>,
    cascade: CascadeGraph,
}

impl BundleConfig {
    /// Configuration of a repository without a manifest.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(
        entries: BTreeMap<String, PatternList>,
        externals: BTreeMap<String, ExternalRef>,
    ) -> Self {
        let cascade = CascadeGraph::build(&entries);
        Self {
            entries,
            externals,
            cascade,
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, PatternList> {
        &self.entries
    }

    pub fn externals(&self) -> &BTreeMap<String, ExternalRef> {
        &self.externals
    }

    pub fn cascade(&self) -> &CascadeGraph {
        &self.cascade
    }

    pub fn bundle(&self, name: &str) -> Option<&PatternList> {
        self.entries.get(name)
    }

    pub fn is_bundle(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn external(&self, leaf: &str) -> Option<&ExternalRef> {
        self.externals.get(leaf)
    }

    /// Bundles whose pattern lists net-include `path`.
    pub fn bundles_including<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, patterns)| patterns.includes(path))
            .map(|(name, _)| name.as_str())
    }
}

/// Parse a raw manifest document.
pub fn parse(raw: &str) -> Result<BundleConfig> {
    let manifest: RawManifest = serde_json::from_str(raw).map_err(|e| Error::ManifestParse {
        message: format!("{} isn't a valid JSON file: {}", MANIFEST_FILE, e),
    })?;

    let entries = manifest
        .pkg
        .into_iter()
        .map(|(name, patterns)| (name, PatternList::from_raw(&patterns.into_vec())))
        .collect();

    Ok(BundleConfig::from_parts(entries, manifest.ext))
}

/// Read and parse the manifest of `repo` at `snapshot`.
///
/// A snapshot without a manifest has no bundles.
pub fn load(repo: &str, snapshot: &dyn Snapshot) -> Result<BundleConfig> {
    let Some(bytes) = snapshot.read_optional(MANIFEST_FILE)? else {
        return Ok(BundleConfig::empty());
    };
    let raw = String::from_utf8(bytes).map_err(|_| Error::ManifestParse {
        message: format!("{} in {} is not valid UTF-8", MANIFEST_FILE, repo),
    })?;
    let config = parse(&raw).map_err(|e| match e {
        Error::ManifestParse { message } => Error::ManifestParse {
            message: format!("{} (repository {}, revision {})", message, repo, snapshot.revision()),
        },
        other => other,
    })?;
    debug!(
        "Loaded {} bundles of {} ({} nesting edges)",
        config.entries().len(),
        repo,
        config.cascade().edge_count()
    );
    Ok(config)
}
