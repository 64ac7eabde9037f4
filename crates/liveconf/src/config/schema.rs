use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::workspace::ownership::Ownership;
use crate::workspace::scanner::{DEFAULT_IGNORED_FILES, DEFAULT_RESERVED_SEGMENTS};

/// Host settings: where the workspace lives and which managers it registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Workspace root directory.
    pub workspace: PathBuf,
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub watch: WatchSettings,
    /// Resource managers in registration (= reconciliation) order.
    pub managers: Vec<ManagerSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    #[serde(default = "default_reserved_segments")]
    pub reserved_segments: Vec<String>,
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            reserved_segments: default_reserved_segments(),
            ignored_files: default_ignored_files(),
        }
    }
}

fn default_reserved_segments() -> Vec<String> {
    DEFAULT_RESERVED_SEGMENTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignored_files() -> Vec<String> {
    DEFAULT_IGNORED_FILES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSettings {
    /// Quiet period before a burst of file events triggers a cycle.
    #[serde(default = "default_debounce_millis")]
    pub debounce_millis: u64,
    /// Interval of the periodic safety-net cycle; 0 disables it.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_millis: default_debounce_millis(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_debounce_millis() -> u64 {
    500
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// One registered resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSettings {
    /// Resource kind, unique within the workspace.
    pub kind: String,
    /// Base directory, relative to the workspace root.
    pub directory: PathBuf,
    #[serde(default)]
    pub ownership: Ownership,
    /// Whether this manager owns live connection pools.
    #[serde(default)]
    pub pool: bool,
    /// Element name → referenced kind, for hard dependencies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, String>,
    /// Element name → referenced kind, for soft dependencies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub soft_references: BTreeMap<String, String>,
}
