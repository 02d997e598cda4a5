//! # Bundle Publish Library
//!
//! This library incrementally rebuilds and republishes concatenated file
//! *bundles* from source trees held in git repositories. It is used by the
//! `bundle-publish` command-line tool but the whole pipeline also runs
//! against in-memory repositories, which is how it is tested.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use bundle_publish::diff::{propagate, ChangeKind, DiffSet};
//! use bundle_publish::manifest;
//! use bundle_publish::resolver::{Content, NoExternals, RepoView, Resolver};
//! use bundle_publish::snapshot::MemorySnapshot;
//!
//! let config = manifest::parse(r#"{"pkg": {"app.js": ["src/*.js"]}}"#).unwrap();
//!
//! // A change below src/ affects app.js
//! let mut diff: DiffSet = [("src/b.js", ChangeKind::Modified)].into_iter().collect();
//! propagate(&mut diff, &config, None);
//! assert_eq!(diff.get("app.js"), Some(ChangeKind::Affected));
//!
//! // Resolving app.js concatenates its leaves in path order
//! let snapshot = MemorySnapshot::new("r1")
//!     .with_file("src/a.js", "a")
//!     .with_file("src/b.js", "b");
//! let view = RepoView::new("web", Arc::new(snapshot), Arc::new(config));
//! let content = Resolver::new(&NoExternals).resolve("app.js", &view).unwrap();
//! assert_eq!(content, Content::Text("a\nb".to_string()));
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifest (`manifest`, `pattern`)**: `concatfile.json` maps bundle names
//!   to ordered include/exclude glob lists (`pkg`) and declares leaves owned
//!   by other repositories (`ext`). Parsing also derives the reverse index of
//!   which bundle nests which.
//! - **Propagation (`diff`)**: turns the raw paths changed by a commit into
//!   the closed set of bundles that must be rebuilt.
//! - **Cascades (`cascade`)**: translates that set into the other
//!   repositories embedding the changed content.
//! - **Resolution (`resolver`, `ordered_set`, `preprocess`)**: flattens a
//!   bundle into its ordered leaves and concatenates their content.
//! - **Repositories (`repository`, `git`, `snapshot`, `registry`, `cache`)**:
//!   history access through a backend trait, persisted repository locations
//!   and last published revisions, cached manifests.
//! - **Publishing (`publish`, `transport`, `session`, `fanout`)**: walks
//!   revisions in order, hands resolved outputs to a transport and reports
//!   progress, optionally to a TCP consumer.
//!
//! ## Execution Flow
//!
//! For every new first-parent revision of a repository:
//!
//! 1.  **Diff**: read the paths the revision changed.
//! 2.  **Propagate**: compute the affected bundles within the publish scope.
//! 3.  **Resolve**: rebuild every affected bundle, a few at a time.
//! 4.  **Deliver**: write or delete the outputs in the publish target and commit.
//! 5.  **Cascade**: republish other repositories embedding the changed files.

pub mod cache;
pub mod cascade;
pub mod config;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod fanout;
pub mod git;
pub mod manifest;
pub mod ordered_set;
pub mod output;
pub mod pattern;
pub mod preprocess;
pub mod publish;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
mod pattern_proptest;
