//! # Error Handling
//!
//! This module defines the centralized error type for `bundle-publish`. It
//! uses the `thiserror` library to describe every anticipated failure mode of
//! the publish pipeline with enough context to diagnose it.
//!
//! ## Severity
//!
//! The variants fall into a few groups that the publish pipeline treats
//! differently:
//!
//! - **`ManifestParse`**: the bundle manifest of a repository is not valid.
//!   The whole changeset halts and nothing is published for it.
//! - **`Resolution`**, **`ExternalReference`** and **`CycleDetected`**: a
//!   single bundle cannot be resolved. The changeset halts before anything is
//!   handed to the transport, since a broken bundle must never be published
//!   as partial content.
//! - **`Transport`**: writing or committing into the publish target failed.
//!   The changeset halts; resolved content is discarded.
//! - **`Changeset`**: wraps any of the above together with the revision that
//!   failed, so a sequential revision walk can report where to resume.
//!
//! The `Result` type alias is used throughout the library.

use thiserror::Error;

/// Main error type for bundle-publish operations
#[derive(Error, Debug)]
pub enum Error {
    /// The bundle manifest is not valid structured data or has the wrong shape.
    #[error("Manifest parsing error: {message}")]
    ManifestParse { message: String },

    /// A bundle could not be resolved into content.
    #[error("Cannot resolve {bundle} in {repo}: {message}")]
    Resolution {
        repo: String,
        bundle: String,
        message: String,
    },

    /// An external reference names a repository that is not registered or
    /// cannot be opened.
    #[error("External reference {path} -> {target_repo}:{uri} failed: {message}")]
    ExternalReference {
        path: String,
        target_repo: String,
        uri: String,
        message: String,
    },

    /// Nested bundles or external references form a cycle.
    #[error("Cycle detected in bundle references: {cycle}")]
    CycleDetected { cycle: String },

    /// The transport backend failed to write or commit into the publish target.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A git command exited unsuccessfully.
    #[error("Git command failed in {location}: {command} - {stderr}")]
    GitCommand {
        command: String,
        location: String,
        stderr: String,
    },

    /// A path was read as a file but is a directory in the snapshot.
    #[error("{path} is a directory at {revision}")]
    IsDirectory { path: String, revision: String },

    /// A path does not exist in the snapshot.
    #[error("{path} does not exist at {revision}")]
    NotFound { path: String, revision: String },

    /// A repository identifier is not known to the registry.
    #[error("There's no repository named {repo}")]
    RepositoryNotFound { repo: String },

    /// Server settings or a per-repository publish configuration is invalid.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The persisted registry could not be read or written.
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// No consumer connected to the progress session in time.
    #[error("Can not connect to server, timeout after {seconds}s")]
    SessionTimeout { seconds: u64 },

    /// Publishing a specific changeset failed.
    #[error("Publishing {repo}@{revision} failed: {source}")]
    Changeset {
        repo: String,
        revision: String,
        #[source]
        source: Box<Error>,
    },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Attach the failing revision to an error raised while publishing it.
    pub fn in_changeset(self, repo: &str, revision: &str) -> Self {
        match self {
            Error::Changeset { .. } => self,
            other => Error::Changeset {
                repo: repo.to_string(),
                revision: revision.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The revision at which a sequential publish stopped, if known.
    pub fn failed_revision(&self) -> Option<&str> {
        match self {
            Error::Changeset { revision, .. } => Some(revision),
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
