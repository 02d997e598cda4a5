//! Persisted key-value registry of repository state
//!
//! Two namespaces are used:
//!
//! - `repositories/<repo>`: on-disk location of the repository's mirror
//! - `changeset/<repo>`: last revision published for the repository
//!
//! The whole registry is one small JSON document rewritten on every update.
//! A registry without a backing file lives in memory only.

use crate::error::{Error, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const REPOSITORIES: &str = "repositories";
pub const CHANGESET: &str = "changeset";

type Namespaces = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone)]
pub struct Registry {
    path: Option<PathBuf>,
    data: Arc<Mutex<Namespaces>>,
}

impl Registry {
    /// A registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Arc::new(Mutex::new(Namespaces::new())),
        }
    }

    /// Open the registry stored at `path`, starting empty if it is missing.
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw).map_err(|e| Error::Registry {
                message: format!("{} is corrupt: {}", path.display(), e),
            })?
        } else {
            Namespaces::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            data: Arc::new(Mutex::new(data)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Namespaces>> {
        self.data.lock().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })
    }

    pub fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    /// Store a value and persist the registry.
    pub fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut data = self.lock()?;
        data.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    /// All entries of a namespace.
    pub fn entries(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.lock()?.get(namespace).cloned().unwrap_or_default())
    }

    fn persist(&self, data: &Namespaces) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(data)?;
        // Readers only ever see a complete document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        debug!("Registry saved to {}", path.display());
        Ok(())
    }

    pub fn location(&self, repo: &str) -> Result<Option<PathBuf>> {
        Ok(self.get(REPOSITORIES, repo)?.map(PathBuf::from))
    }

    pub fn set_location(&self, repo: &str, location: &Path) -> Result<()> {
        self.set(REPOSITORIES, repo, &location.to_string_lossy())
    }

    pub fn last_published(&self, repo: &str) -> Result<Option<String>> {
        self.get(CHANGESET, repo)
    }

    pub fn set_last_published(&self, repo: &str, revision: &str) -> Result<()> {
        self.set(CHANGESET, repo, revision)
    }

    /// Identifiers of every registered repository.
    pub fn repositories(&self) -> Result<Vec<String>> {
        Ok(self.entries(REPOSITORIES)?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_roundtrip() {
        let registry = Registry::in_memory();
        assert_eq!(registry.last_published("web").unwrap(), None);
        registry.set_last_published("web", "abc").unwrap();
        assert_eq!(registry.last_published("web").unwrap().as_deref(), Some("abc"));
        assert!(registry.path().is_none());
    }

    #[test]
    fn test_persisted_across_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/registry.json");

        let registry = Registry::open(&path).unwrap();
        registry.set_location("web", Path::new("/m/web.git")).unwrap();
        registry.set_last_published("web", "r2").unwrap();

        let reopened = Registry::open(&path).unwrap();
        assert_eq!(reopened.location("web").unwrap(), Some(PathBuf::from("/m/web.git")));
        assert_eq!(reopened.last_published("web").unwrap().as_deref(), Some("r2"));
        assert_eq!(reopened.repositories().unwrap(), vec!["web"]);
    }

    #[test]
    fn test_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.json");
        fs::write(&path, "{broken").unwrap();
        assert!(matches!(Registry::open(&path).unwrap_err(), Error::Registry { .. }));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let registry = Registry::in_memory();
        registry.set(REPOSITORIES, "web", "/m/web.git").unwrap();
        assert_eq!(registry.get(CHANGESET, "web").unwrap(), None);
        assert_eq!(registry.entries(REPOSITORIES).unwrap().len(), 1);
    }
}
