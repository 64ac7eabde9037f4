//! Last observed state of a workspace and the delta against a new scan.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::scanner::ScannedFile;

/// Mapping of file path to last-modified timestamp (ms since epoch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    files: HashMap<PathBuf, u64>,
}

impl WorkspaceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a scan result.
    pub fn from_scan(files: &[ScannedFile]) -> Self {
        Self {
            files: files
                .iter()
                .map(|f| (f.path.clone(), f.modified))
                .collect(),
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, modified: u64) {
        self.files.insert(path.into(), modified);
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.files.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All recorded paths, sorted.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.files.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.files.iter().map(|(p, t)| (p.as_path(), *t))
    }
}

/// Changes between a previous snapshot and a current scan.
///
/// The four sets partition the union of previous and current paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDelta {
    pub added: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    pub modified: BTreeSet<PathBuf>,
    pub unmodified: BTreeSet<PathBuf>,
}

impl FileDelta {
    /// Classifies every path of `previous` and `current`.
    pub fn between(previous: &WorkspaceSnapshot, current: &WorkspaceSnapshot) -> Self {
        let mut delta = FileDelta::default();

        for (path, modified) in current.iter() {
            match previous.get(path) {
                None => {
                    delta.added.insert(path.to_path_buf());
                }
                Some(last) if last != modified => {
                    delta.modified.insert(path.to_path_buf());
                }
                Some(_) => {
                    delta.unmodified.insert(path.to_path_buf());
                }
            }
        }

        for (path, _) in previous.iter() {
            if !current.contains(path) {
                delta.removed.insert(path.to_path_buf());
            }
        }

        delta
    }

    /// Returns true when nothing was added, removed, or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Number of added, removed, and modified files.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Logs counts, and each changed file at trace level.
    pub fn log(&self) {
        log::debug!(
            "Workspace delta: {} new, {} removed, {} modified, {} unmodified",
            self.added.len(),
            self.removed.len(),
            self.modified.len(),
            self.unmodified.len()
        );
        for (label, files) in [
            ("new", &self.added),
            ("removed", &self.removed),
            ("modified", &self.modified),
        ] {
            for file in files {
                log::trace!("{}: {}", label, file.display());
            }
        }
    }
}
