//! A workspace: one root directory and the ordered managers that own its files.

pub mod ownership;
pub mod scanner;
pub mod snapshot;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::graph::DependencyGraph;
use crate::resource::{
    ConnectionParamsManager, ConnectionPools, DirectoryManager, ResourceIdentifier,
    ResourceManager, ResourceState,
};

pub use ownership::Ownership;
pub use scanner::{ScanRules, ScannedFile, WorkspaceScanner};
pub use snapshot::{FileDelta, WorkspaceSnapshot};

/// Root directory plus resource managers in registration order.
#[derive(Clone)]
pub struct Workspace {
    location: PathBuf,
    managers: Vec<Arc<dyn ResourceManager>>,
    pools: Arc<ConnectionPools>,
}

impl Workspace {
    /// Creates a workspace from hand-built managers.
    ///
    /// Its pool registry starts empty; pass the one the pool-capable managers
    /// drive with [`with_pools`](Self::with_pools).
    pub fn new(location: impl Into<PathBuf>, managers: Vec<Arc<dyn ResourceManager>>) -> Self {
        Self {
            location: location.into(),
            managers,
            pools: Arc::new(ConnectionPools::new()),
        }
    }

    /// Uses `pools` as the registry reported by [`pools`](Self::pools).
    pub fn with_pools(mut self, pools: Arc<ConnectionPools>) -> Self {
        self.pools = pools;
        self
    }

    /// Builds the managers declared in `settings`.
    ///
    /// Pool-capable managers share one [`ConnectionPools`] registry,
    /// available through [`pools`](Self::pools).
    pub fn from_settings(settings: &Settings) -> Self {
        let location = settings.workspace.clone();
        let pools = Arc::new(ConnectionPools::new());

        let managers = settings
            .managers
            .iter()
            .map(|m| {
                let base_dir = location.join(&m.directory);
                let manager: Arc<dyn ResourceManager> = if m.pool {
                    Arc::new(
                        ConnectionParamsManager::new(m.kind.clone(), base_dir, Arc::clone(&pools))
                            .with_ownership(m.ownership)
                            .with_references(m.references.clone())
                            .with_soft_references(m.soft_references.clone()),
                    )
                } else {
                    Arc::new(
                        DirectoryManager::new(m.kind.clone(), base_dir)
                            .with_ownership(m.ownership)
                            .with_references(m.references.clone())
                            .with_soft_references(m.soft_references.clone()),
                    )
                };
                log::debug!(
                    "Registered {} manager for {}",
                    m.kind,
                    manager.base_dir().display()
                );
                manager
            })
            .collect();

        Self {
            location,
            managers,
            pools,
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn managers(&self) -> &[Arc<dyn ResourceManager>] {
        &self.managers
    }

    /// Manager registered for `kind`.
    pub fn manager(&self, kind: &str) -> Option<&Arc<dyn ResourceManager>> {
        self.managers.iter().find(|m| m.kind() == kind)
    }

    /// The pool registry shared by the pool-capable managers.
    pub fn pools(&self) -> &Arc<ConnectionPools> {
        &self.pools
    }

    /// Current states of every manager, in registration order.
    pub fn states(&self) -> Vec<ResourceState> {
        self.managers.iter().flat_map(|m| m.states()).collect()
    }

    pub fn state_of(&self, identifier: &ResourceIdentifier) -> Option<ResourceState> {
        self.manager(&identifier.kind)
            .and_then(|m| m.state(&identifier.id))
    }

    /// Assembles the dependency graph from the managers' current states.
    ///
    /// This is an unlocked read and may observe a cycle in progress.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_states(self.states())
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("location", &self.location)
            .field(
                "managers",
                &self.managers.iter().map(|m| m.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_settings_from_str;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_settings_builds_managers_in_order() {
        let settings = load_settings_from_str(
            r#"
workspace: /srv/ws
managers:
  - { kind: jdbc, directory: jdbc, pool: true }
  - { kind: feature, directory: datasources/feature }
"#,
        )
        .unwrap();

        let workspace = Workspace::from_settings(&settings);

        let kinds: Vec<&str> = workspace.managers().iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["jdbc", "feature"]);
        assert_eq!(
            workspace.managers()[1].base_dir(),
            Path::new("/srv/ws/datasources/feature")
        );
        assert!(workspace.managers()[0].pool_lifecycle().is_some());
        assert!(workspace.managers()[1].pool_lifecycle().is_none());
    }

    #[test]
    fn test_state_of_and_graph() {
        let dir = TempDir::new().unwrap();
        let jdbc = dir.path().join("jdbc");
        let feature = dir.path().join("feature");
        fs::create_dir_all(&jdbc).unwrap();
        fs::create_dir_all(&feature).unwrap();
        fs::write(jdbc.join("conn1.xml"), "<JDBC><Url>jdbc:pg://db</Url></JDBC>").unwrap();
        fs::write(
            feature.join("roads.xml"),
            "<Store><JDBCConnId>conn1</JDBCConnId></Store>",
        )
        .unwrap();

        let jdbc_manager = Arc::new(DirectoryManager::new("jdbc", &jdbc));
        let feature_manager = Arc::new(
            DirectoryManager::new("feature", &feature).with_reference("JDBCConnId", "jdbc"),
        );
        jdbc_manager
            .update_resource_config("conn1", Some(&jdbc.join("conn1.xml")))
            .unwrap();
        feature_manager
            .update_resource_config("roads", Some(&feature.join("roads.xml")))
            .unwrap();

        let workspace = Workspace::new(
            dir.path(),
            vec![jdbc_manager as Arc<dyn ResourceManager>, feature_manager],
        );

        let roads = ResourceIdentifier::new("feature", "roads");
        let state = workspace.state_of(&roads).unwrap();
        assert_eq!(state.dependencies, vec![ResourceIdentifier::new("jdbc", "conn1")]);
        assert!(workspace
            .state_of(&ResourceIdentifier::new("style", "roads"))
            .is_none());

        let graph = workspace.dependency_graph();
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.roots(),
            vec![ResourceIdentifier::new("jdbc", "conn1")]
        );
    }

    #[test]
    fn test_hand_built_workspace_reports_shared_pools() {
        let dir = TempDir::new().unwrap();
        let jdbc = dir.path().join("jdbc");
        fs::create_dir_all(&jdbc).unwrap();
        fs::write(jdbc.join("conn1.xml"), "<JDBC><Url>jdbc:h2:mem</Url></JDBC>").unwrap();

        let pools = Arc::new(ConnectionPools::new());
        let manager: Arc<dyn ResourceManager> = Arc::new(ConnectionParamsManager::new(
            "jdbc",
            &jdbc,
            Arc::clone(&pools),
        ));
        let workspace = Workspace::new(dir.path(), vec![manager]).with_pools(Arc::clone(&pools));

        crate::reconciler::WorkspaceReconciler::new()
            .start(&workspace)
            .unwrap();

        assert!(Arc::ptr_eq(workspace.pools(), &pools));
        assert!(workspace.pools().contains("conn1"));
    }

    #[test]
    fn test_pool_manager_from_settings_keeps_references() {
        let settings = load_settings_from_str(
            r#"
workspace: /srv/ws
managers:
  - kind: jdbc
    directory: jdbc
    pool: true
    references: { CredentialsId: credentials }
  - { kind: credentials, directory: credentials }
"#,
        )
        .unwrap();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("conn1.xml");
        fs::write(
            &file,
            "<JDBC><Url>jdbc:h2:mem</Url><CredentialsId>vault</CredentialsId></JDBC>",
        )
        .unwrap();

        let workspace = Workspace::from_settings(&settings);
        workspace.managers()[0]
            .update_resource_config("conn1", Some(&file))
            .unwrap();

        let state = workspace
            .state_of(&ResourceIdentifier::new("jdbc", "conn1"))
            .unwrap();
        assert_eq!(
            state.dependencies,
            vec![ResourceIdentifier::new("credentials", "vault")]
        );
    }
}
