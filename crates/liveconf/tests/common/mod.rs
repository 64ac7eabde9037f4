//! Shared fixtures for liveconf integration tests.
//!
//! `WorkspaceHarness` owns a temporary directory holding a settings file and
//! the workspace it points at. File writes pin modification times to a
//! private clock so the differ never depends on filesystem timestamp
//! granularity.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use liveconf::{load_settings, Settings, Workspace, WorkspaceReconciler};

/// Settings used by most tests: a pool-capable `jdbc` kind, features that
/// reference connections and styles, and services sharing a directory with
/// their metadata.
pub const DEFAULT_SETTINGS: &str = r#"
workspace: ws
managers:
  - kind: jdbc
    directory: jdbc
    pool: true
  - kind: feature
    directory: datasources/feature
    references: { JDBCConnId: jdbc }
    softReferences: { StyleId: style }
  - kind: style
    directory: styles
  - kind: services
    directory: services
    ownership: excludeMetadata
  - kind: metadata
    directory: services
    ownership: metadataOnly
"#;

pub fn connection(url: &str) -> String {
    format!(
        "<JDBCConnection>\n  <Url>{}</Url>\n  <User>gis</User>\n  <Password>secret</Password>\n</JDBCConnection>\n",
        url
    )
}

pub fn feature_store(connection: &str, style: Option<&str>) -> String {
    let style = style
        .map(|s| format!("  <StyleId>{}</StyleId>\n", s))
        .unwrap_or_default();
    format!(
        "<FeatureStore>\n  <JDBCConnId>{}</JDBCConnId>\n{}</FeatureStore>\n",
        connection, style
    )
}

/// Isolated settings file plus workspace directory.
pub struct WorkspaceHarness {
    temp_dir: TempDir,
    settings_path: PathBuf,
    workspace_dir: PathBuf,
    clock: u64,
}

impl WorkspaceHarness {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_SETTINGS)
    }

    pub fn with_settings(yaml: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings_file = temp_dir.child("settings.yaml");
        settings_file
            .write_str(yaml)
            .expect("Failed to write settings");

        let workspace_dir = temp_dir.path().join("ws");
        fs::create_dir_all(&workspace_dir).expect("Failed to create workspace directory");

        Self {
            settings_path: settings_file.path().to_path_buf(),
            temp_dir,
            workspace_dir,
            clock: 1_000,
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// The workspace root the settings resolve to.
    pub fn root(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.workspace_dir.join(relative)
    }

    pub fn settings(&self) -> Settings {
        load_settings(&self.settings_path).expect("Failed to load settings")
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::from_settings(&self.settings())
    }

    pub fn reconciler(&self) -> WorkspaceReconciler {
        WorkspaceReconciler::with_rules((&self.settings().scan).into())
    }

    /// Writes `content` under the workspace root with a fresh modification time.
    pub fn write(&mut self, relative: &str, content: &str) -> PathBuf {
        self.clock += 10;
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        let file = fs::File::options()
            .write(true)
            .open(&path)
            .expect("Failed to reopen file");
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock))
            .expect("Failed to pin modification time");
        path
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).expect("Failed to remove file");
    }

    /// Moves a file, keeping its modification time.
    pub fn rename(&self, from: &str, to: &str) -> PathBuf {
        let target = self.path(to);
        fs::rename(self.path(from), &target).expect("Failed to rename file");
        target
    }
}

impl Default for WorkspaceHarness {
    fn default() -> Self {
        Self::new()
    }
}
