pub mod config;
pub mod error;
pub mod graph;
pub mod reconciler;
pub mod resource;
pub mod watch;
pub mod workspace;

pub use config::{load_settings, load_settings_from_str, Settings};
pub use error::{GraphError, ManagerError, PoolError, ReconcileError, Result, SettingsError};
pub use graph::{DependencyGraph, GraphDump, ResourceNode};
pub use reconciler::{FileAction, FileOutcome, Outcome, ReconcileReport, WorkspaceReconciler};
pub use resource::{
    ConnectionParamsManager, ConnectionPools, DirectoryManager, PoolLifecycle, PoolParams,
    ResourceIdentifier, ResourceManager, ResourceState, ResourceStatus,
};
pub use watch::{AsyncWorkspaceWatcher, ReconcileScheduler, WorkspaceWatcher};
pub use workspace::{Ownership, ScanRules, Workspace, WorkspaceScanner};
