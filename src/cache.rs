//! In-process caching of parsed bundle manifests
//!
//! Parsing a manifest also builds its cascade graph, which is quadratic in
//! the number of bundles. The cache keeps one [`BundleConfig`] per
//! repository and reparses only when a changeset touches the manifest file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::diff::DiffSet;
use crate::error::{Error, Result};
use crate::manifest::{self, BundleConfig, MANIFEST_FILE};
use crate::snapshot::Snapshot;
use log::debug;

/// Whether `diff` reports the manifest itself as changed.
pub fn invalidates(diff: &DiffSet) -> bool {
    diff.contains(MANIFEST_FILE)
}

/// Cache of parsed manifests keyed by repository id
#[derive(Debug, Clone, Default)]
pub struct ManifestCache {
    cache: Arc<Mutex<HashMap<String, Arc<BundleConfig>>>>,
}

impl ManifestCache {
    /// Create a new empty manifest cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<BundleConfig>>>> {
        self.cache.lock().map_err(|_| Error::LockPoisoned {
            context: "manifest cache".to_string(),
        })
    }

    /// Configuration of `repo` at `snapshot`, parsing it when not cached or
    /// when `diff` touches the manifest.
    ///
    /// A manifest that fails to parse evicts any stale entry and is not cached.
    pub fn get_or_load(
        &self,
        repo: &str,
        snapshot: &dyn Snapshot,
        diff: Option<&DiffSet>,
    ) -> Result<Arc<BundleConfig>> {
        let stale = diff.is_some_and(invalidates);
        if !stale {
            if let Some(cached) = self.get(repo)? {
                return Ok(cached);
            }
        }

        debug!("Parsing {} of {} at {}", MANIFEST_FILE, repo, snapshot.revision());
        match manifest::load(repo, snapshot) {
            Ok(config) => {
                let config = Arc::new(config);
                self.insert(repo, Arc::clone(&config))?;
                Ok(config)
            }
            Err(e) => {
                self.invalidate(repo)?;
                Err(e)
            }
        }
    }

    /// Manually insert a configuration
    pub fn insert(&self, repo: &str, config: Arc<BundleConfig>) -> Result<()> {
        self.lock()?.insert(repo.to_string(), config);
        Ok(())
    }

    /// Get a cached configuration without parsing
    pub fn get(&self, repo: &str) -> Result<Option<Arc<BundleConfig>>> {
        Ok(self.lock()?.get(repo).cloned())
    }

    /// Drop the cached configuration of `repo`
    pub fn invalidate(&self, repo: &str) -> Result<()> {
        self.lock()?.remove(repo);
        Ok(())
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
