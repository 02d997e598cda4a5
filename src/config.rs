//! # Configuration
//!
//! Two configuration documents drive a publish:
//!
//! - **Server settings** (`bundle-publish.yaml`, YAML): where the workspace
//!   lives, which source repositories to mirror and where the publish target
//!   working copy is. Read once per invocation by the CLI.
//!
//! - **Publish config** (`.gspconfig`, JSON, one per source repository):
//!   read from the repository snapshot being published. It scopes the
//!   published outputs (`publish_dir`), names the directory inside the
//!   publish target that receives them (`mapping_dir`) and configures the
//!   preprocessor pipeline.
//!
//! ```yaml
//! workspace: /srv/bundle-publish
//! sources:
//!   url_prefix: git@git.example.com:web/
//!   repos: [shop, common]
//! target:
//!   path: /srv/bundle-publish/publish
//!   name: Publisher
//!   email: publisher@example.com
//!   push: true
//! ```

use crate::defaults;
use crate::error::{Error, Result};
use crate::preprocess::{default_map, Pipeline};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the per-repository publish config.
pub const PUBLISH_CONFIG_FILE: &str = ".gspconfig";

/// Source repositories to mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Prepended to each repository name to form its clone URL
    #[serde(default)]
    pub url_prefix: String,
    /// Repository names, optionally with a `.git` suffix
    #[serde(default)]
    pub repos: Vec<String>,
}

/// Publish target working copy and committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Git working copy receiving published bundles. Relative paths are
    /// resolved against the workspace.
    #[serde(default = "defaults::default_target_dir")]
    pub path: PathBuf,
    #[serde(default = "defaults::default_committer_name")]
    pub name: String,
    #[serde(default = "defaults::default_committer_email")]
    pub email: String,
    /// Push to `origin` after each commit
    #[serde(default)]
    pub push: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            path: defaults::default_target_dir(),
            name: defaults::default_committer_name(),
            email: defaults::default_committer_email(),
            push: false,
        }
    }
}

/// Contents of `bundle-publish.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "defaults::default_workspace")]
    pub workspace: PathBuf,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub target: TargetConfig,
    /// Bound on parallel fetches and bundle resolutions
    #[serde(default = "defaults::default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "defaults::default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            workspace: defaults::default_workspace(),
            sources: SourcesConfig::default(),
            target: TargetConfig::default(),
            concurrency: defaults::default_concurrency(),
            session_timeout_secs: defaults::default_session_timeout_secs(),
        }
    }
}

impl ServerSettings {
    /// Parse settings from YAML text.
    pub fn parse(yaml: &str) -> Result<Self> {
        let settings: ServerSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file. A relative workspace is resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Cannot read {}: {}", path.display(), e),
        })?;
        let mut settings = Self::parse(&content)?;
        if settings.workspace.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            settings.workspace = base.join(&settings.workspace);
        }
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        if self.session_timeout_secs == 0 {
            return Err(Error::Config {
                message: "session_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Directory holding the bare mirrors of source repositories.
    pub fn mirrors_dir(&self) -> PathBuf {
        self.workspace.join("mirrors")
    }

    /// Location of the persisted registry.
    pub fn registry_path(&self) -> PathBuf {
        self.workspace.join("registry.json")
    }

    /// Publish target working copy.
    pub fn target_dir(&self) -> PathBuf {
        if self.target.path.is_absolute() {
            self.target.path.clone()
        } else {
            self.workspace.join(&self.target.path)
        }
    }

    /// Repository identifiers, without `.git` suffixes.
    pub fn repo_ids(&self) -> Vec<String> {
        self.sources
            .repos
            .iter()
            .map(|repo| repo.trim_end_matches(".git").to_string())
            .collect()
    }

    /// Clone URL of a configured repository.
    pub fn clone_url(&self, repo: &str) -> String {
        format!("{}{}", self.sources.url_prefix, repo)
    }

    /// Path of the bare mirror for `repo`.
    pub fn mirror_path(&self, repo: &str) -> PathBuf {
        self.mirrors_dir().join(format!("{}.git", repo))
    }
}

/// Contents of a repository's `.gspconfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Only bundles under this directory are published
    #[serde(default)]
    pub publish_dir: Option<String>,
    /// Directory inside the publish target receiving this repository's bundles
    #[serde(default)]
    pub mapping_dir: Option<String>,
    /// Extension -> preprocessor names
    #[serde(default)]
    pub preprocessors: Option<BTreeMap<String, Vec<String>>>,
}

impl PublishConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config {
            message: format!("{} isn't a valid JSON file: {}", PUBLISH_CONFIG_FILE, e),
        })
    }

    /// Read the publish config from a snapshot; absent means defaults.
    pub fn load(snapshot: &dyn Snapshot) -> Result<Self> {
        match snapshot.read_optional(PUBLISH_CONFIG_FILE)? {
            Some(bytes) => Self::parse(&String::from_utf8_lossy(&bytes)),
            None => Ok(Self::default()),
        }
    }

    /// Publish scope, ignoring empty values.
    pub fn scope(&self) -> Option<&str> {
        self.publish_dir
            .as_deref()
            .map(|dir| dir.trim_end_matches('/'))
            .filter(|dir| !dir.is_empty() && *dir != ".")
    }

    /// Preprocessor pipeline for this repository.
    pub fn pipeline(&self) -> Pipeline {
        match &self.preprocessors {
            Some(map) => Pipeline::from_map(map),
            None => Pipeline::from_map(&default_map()),
        }
    }
}
