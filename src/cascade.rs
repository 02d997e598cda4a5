//! Cross-repository diff translation
//!
//! When repository A publishes, every other registered repository whose
//! manifest embeds one of A's changed paths through an `ext` entry has to be
//! republished too. [`translate`] computes those outgoing diff sets and
//! [`plan`] turns them into [`Cascade`] jobs carrying a [`CascadeTrail`], so
//! transitive chains (A into B into C) can be followed and explained.

use crate::diff::DiffSet;
use crate::manifest::BundleConfig;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One step of a cascade chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub repo: String,
    pub bundles: Vec<String>,
}

/// Audit trail carried through recursive cascades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeTrail {
    origin: String,
    reason: String,
    hops: Vec<Hop>,
}

impl CascadeTrail {
    /// Start a trail for a publish of `origin` at `revision`.
    pub fn new(origin: &str, revision: &str) -> Self {
        Self {
            origin: origin.to_string(),
            reason: format!("{}@{}", origin, short(revision)),
            hops: Vec::new(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Repository the most recent hop landed in.
    pub fn current(&self) -> &str {
        self.hops.last().map_or(self.origin.as_str(), |hop| hop.repo.as_str())
    }

    /// Whether `repo` already took part in this chain.
    pub fn visits(&self, repo: &str) -> bool {
        self.origin == repo || self.hops.iter().any(|hop| hop.repo == repo)
    }

    /// A copy of this trail extended by a hop into `repo`.
    pub fn extend(&self, repo: &str, diff: &DiffSet) -> Self {
        let mut next = self.clone();
        next.hops.push(Hop {
            repo: repo.to_string(),
            bundles: diff.paths().map(str::to_string).collect(),
        });
        next
    }

    /// Commit message for the publish at the end of this trail.
    pub fn commit_message(&self) -> String {
        let mut message = format!("Cascade from {}\n", self.reason);
        for hop in &self.hops {
            message.push_str(&format!("\n{}: {}", hop.repo, hop.bundles.join(", ")));
        }
        message
    }
}

impl fmt::Display for CascadeTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        for hop in &self.hops {
            write!(f, " -> {}", hop.repo)?;
        }
        Ok(())
    }
}

/// Abbreviate a full object id for messages.
fn short(revision: &str) -> &str {
    revision.get(..7).unwrap_or(revision)
}

/// A republish scheduled in another repository.
#[derive(Debug, Clone)]
pub struct Cascade {
    pub target: String,
    pub diff: DiffSet,
    pub trail: CascadeTrail,
}

/// Compute the affected bundles of every other repository embedding a path
/// from `affected`.
///
/// `affected` should hold both the raw changed paths and the propagated
/// bundles of `source_repo`, since externals may reference either.
pub fn translate(
    affected: &DiffSet,
    source_repo: &str,
    configs: &BTreeMap<String, Arc<BundleConfig>>,
) -> BTreeMap<String, DiffSet> {
    let mut outgoing = BTreeMap::new();

    for (repo, config) in configs {
        if repo == source_repo {
            continue;
        }
        let mut diff = DiffSet::new();
        for (local, external) in config.externals() {
            if external.repo != source_repo || !affected.contains(&external.uri) {
                continue;
            }
            for bundle in config.bundles_including(local) {
                if diff.mark_affected(bundle) {
                    debug!(
                        "{}:{} embeds {}:{} through {}",
                        repo, bundle, source_repo, external.uri, local
                    );
                }
            }
        }
        if !diff.is_empty() {
            outgoing.insert(repo.clone(), diff);
        }
    }

    outgoing
}

/// Translate `affected` and wrap each result in a [`Cascade`] job.
///
/// Targets already present in `trail` are skipped so cross-repository
/// cycles stop after one round.
pub fn plan(
    affected: &DiffSet,
    trail: &CascadeTrail,
    configs: &BTreeMap<String, Arc<BundleConfig>>,
) -> Vec<Cascade> {
    translate(affected, trail.current(), configs)
        .into_iter()
        .filter_map(|(target, diff)| {
            if trail.visits(&target) {
                warn!("Not cascading into {} again ({})", target, trail);
                return None;
            }
            let trail = trail.extend(&target, &diff);
            Some(Cascade { target, diff, trail })
        })
        .collect()
}
