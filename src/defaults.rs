//! Default values for bundle-publish configuration.
//!
//! This module provides centralized default values used by the settings
//! parser and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of the server settings, looked up in the current directory.
pub const SETTINGS_FILE: &str = "bundle-publish.yaml";

/// Returns the default workspace directory.
///
/// Uses the platform-appropriate local data directory:
/// - Linux: `~/.local/share/bundle-publish`
/// - macOS: `~/Library/Application Support/bundle-publish`
/// - Windows: `{FOLDERID_LocalAppData}\bundle-publish`
///
/// Falls back to `.bundle-publish` in the current directory if the platform
/// data directory cannot be determined.
pub fn default_workspace() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".bundle-publish"))
        .join("bundle-publish")
}

/// Publish target working copy, relative to the workspace.
pub fn default_target_dir() -> PathBuf {
    PathBuf::from("publish")
}

pub fn default_committer_name() -> String {
    "bundle-publish".to_string()
}

pub fn default_committer_email() -> String {
    "bundle-publish@localhost".to_string()
}

/// Parallel fetches and bundle resolutions.
pub fn default_concurrency() -> usize {
    5
}

/// Seconds to wait for a progress consumer to connect.
pub fn default_session_timeout_secs() -> u64 {
    10
}
