//! Error types for workspace reconciliation.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::ResourceIdentifier;

/// Errors that abort a reconciliation cycle or a host operation.
///
/// Per-file manager failures never surface here; they are reported as
/// outcomes in the cycle's [`ReconcileReport`](crate::reconciler::ReconcileReport).
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to scan workspace directory '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read metadata of '{path}': {source}")]
    ReadMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl ReconcileError {
    /// Returns the path that could not be enumerated, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ReconcileError::ScanFailed { path, .. } | ReconcileError::ReadMetadata { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Errors raised by a resource manager while applying one configuration file.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Failed to read resource config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse resource config '{path}': {message}")]
    ParseConfig { path: PathBuf, message: String },

    #[error("Resource not found: {kind}/{id}")]
    UnknownResource { kind: String, id: String },

    #[error("Missing required parameter '{name}' in '{path}'")]
    MissingParameter { path: PathBuf, name: String },
}

/// Errors raised while tearing down or creating a connection pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid connection parameters for pool '{id}': {reason}")]
    InvalidParams { id: String, reason: String },

    #[error("Connection pool '{id}' unavailable: {reason}")]
    Unavailable { id: String, reason: String },
}

/// Errors raised while loading or validating the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Duplicate manager kind '{0}'")]
    DuplicateKind(String),

    #[error("Managers '{first}' and '{second}' both claim directory '{directory}'")]
    OverlappingDirectory {
        first: String,
        second: String,
        directory: String,
    },
}

/// Errors raised by dependency graph traversal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Dependency cycle detected involving {}", format_members(.members))]
    Cycle { members: Vec<ResourceIdentifier> },
}

fn format_members(members: &[ResourceIdentifier]) -> String {
    members
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
