//! # CLI Command Implementations
//!
//! Each subcommand of `bundle-publish` lives in its own file with an `Args`
//! struct derived with `clap` and an `execute` function calling into the
//! `bundle_publish` library.
//!
//! Every command reads the server settings first; the helpers below open the
//! registry, the repository manager and the publisher the same way for all
//! of them.

pub mod affected;
pub mod configure;
pub mod publish;
pub mod repos;
pub mod resolve;
pub mod watch;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;

use bundle_publish::config::ServerSettings;
use bundle_publish::git::Identity;
use bundle_publish::output::OutputConfig;
use bundle_publish::publish::Publisher;
use bundle_publish::registry::Registry;
use bundle_publish::repository::RepositoryManager;
use bundle_publish::transport::GitWorkingCopy;

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: PathBuf,
    pub color: String,
}

impl Context {
    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    pub fn settings(&self) -> Result<ServerSettings> {
        ServerSettings::load(&self.config)
            .with_context(|| format!("Failed to load settings from {}", self.config.display()))
    }
}

pub fn open_registry(settings: &ServerSettings) -> Result<Registry> {
    let path = settings.registry_path();
    Registry::open(&path).with_context(|| format!("Failed to open registry {}", path.display()))
}

/// Manager over every repository registered by `configure`.
pub fn open_manager(settings: &ServerSettings) -> Result<RepositoryManager> {
    let registry = open_registry(settings)?;
    Ok(RepositoryManager::from_registry(registry, settings.concurrency)?)
}

/// Publisher delivering into the configured target working copy.
pub fn open_publisher(settings: &ServerSettings) -> Result<Publisher> {
    let transport = GitWorkingCopy::new(
        settings.target_dir(),
        Identity {
            name: settings.target.name.clone(),
            email: settings.target.email.clone(),
        },
        settings.target.push,
    );
    Ok(Publisher::new(open_manager(settings)?, Arc::new(transport)))
}
