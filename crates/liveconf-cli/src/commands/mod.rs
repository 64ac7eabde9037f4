pub mod graph;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};

use liveconf::{load_settings, ReconcileReport, Settings, Workspace, WorkspaceReconciler};

use crate::cli::GlobalArgs;

/// Settings and the workspace they describe, ready for a first cycle.
pub struct LoadedWorkspace {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub workspace: Workspace,
    pub reconciler: WorkspaceReconciler,
}

impl LoadedWorkspace {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let settings_path = global
            .settings_path()
            .context("No settings file given and no platform config directory found")?;
        let settings = load_settings(&settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

        log::debug!(
            "Loaded settings from {}: {} managers",
            settings_path.display(),
            settings.managers.len()
        );

        let workspace = Workspace::from_settings(&settings);
        let reconciler = WorkspaceReconciler::with_rules((&settings.scan).into());
        Ok(Self {
            settings,
            settings_path,
            workspace,
            reconciler,
        })
    }

    /// Loads every resource of the workspace from scratch.
    pub fn load_all(&self) -> Result<ReconcileReport> {
        self.reconciler.start(&self.workspace).with_context(|| {
            format!(
                "Failed to load workspace {}",
                self.workspace.location().display()
            )
        })
    }
}
