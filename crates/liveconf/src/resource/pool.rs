//! Connection parameter resources and the live pools built from them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ManagerError, PoolError};
use crate::workspace::ownership::Ownership;

use super::directory::DirectoryManager;
use super::xml::first_element_texts;
use super::{
    PoolLifecycle, PoolParams, ResourceManager, ResourceState, ResourceStatus,
    DEFAULT_MAX_CONNECTIONS,
};

const URL_ELEMENT: &str = "Url";
const USER_ELEMENT: &str = "User";
const PASSWORD_ELEMENT: &str = "Password";
const MAX_CONNECTIONS_ELEMENT: &str = "MaxConnections";

/// A live connection pool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPool {
    pub id: String,
    pub params: PoolParams,
    pub created_at: DateTime<Utc>,
}

/// Registry of live connection pools keyed by resource id.
///
/// Creation and teardown are idempotent by id: adding replaces an existing
/// pool, destroying an unknown id does nothing.
#[derive(Debug, Default)]
pub struct ConnectionPools {
    pools: RwLock<BTreeMap<String, ConnectionPool>>,
}

impl ConnectionPools {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_pools(&self) -> RwLockReadGuard<'_, BTreeMap<String, ConnectionPool>> {
        match self.pools.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Connection pool lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_pools(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ConnectionPool>> {
        match self.pools.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Connection pool lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Creates the pool for `id`, replacing any existing one.
    pub fn add_pool(&self, id: &str, params: &PoolParams) -> Result<(), PoolError> {
        if params.url.trim().is_empty() {
            return Err(PoolError::InvalidParams {
                id: id.to_string(),
                reason: "connection URL is empty".to_string(),
            });
        }
        if params.max_connections == 0 {
            return Err(PoolError::InvalidParams {
                id: id.to_string(),
                reason: "max connections must be greater than 0".to_string(),
            });
        }

        let pool = ConnectionPool {
            id: id.to_string(),
            params: params.clone(),
            created_at: Utc::now(),
        };
        if self.write_pools().insert(id.to_string(), pool).is_some() {
            log::warn!("Replaced existing connection pool '{}'", id);
        } else {
            log::info!("Created connection pool '{}'", id);
        }
        Ok(())
    }

    /// Destroys the pool for `id`. Returns whether a pool existed.
    pub fn destroy(&self, id: &str) -> bool {
        let existed = self.write_pools().remove(id).is_some();
        if existed {
            log::info!("Destroyed connection pool '{}'", id);
        }
        existed
    }

    pub fn get(&self, id: &str) -> Option<ConnectionPool> {
        self.read_pools().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_pools().contains_key(id)
    }

    /// Ids of all live pools, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.read_pools().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_pools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_pools().is_empty()
    }
}

/// Pool-capable manager for connection parameter resources.
#[derive(Debug)]
pub struct ConnectionParamsManager {
    inner: DirectoryManager,
    params: RwLock<BTreeMap<String, PoolParams>>,
    pools: Arc<ConnectionPools>,
}

impl ConnectionParamsManager {
    pub fn new(
        kind: impl Into<String>,
        base_dir: impl Into<std::path::PathBuf>,
        pools: Arc<ConnectionPools>,
    ) -> Self {
        Self {
            inner: DirectoryManager::new(kind, base_dir),
            params: RwLock::new(BTreeMap::new()),
            pools,
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.inner = self.inner.with_ownership(ownership);
        self
    }

    /// Element name to referenced kind, for hard dependencies.
    pub fn with_references(mut self, references: BTreeMap<String, String>) -> Self {
        self.inner = self.inner.with_references(references);
        self
    }

    pub fn with_soft_references(mut self, references: BTreeMap<String, String>) -> Self {
        self.inner = self.inner.with_soft_references(references);
        self
    }

    /// The pool registry this manager drives.
    pub fn pools(&self) -> &Arc<ConnectionPools> {
        &self.pools
    }

    fn write_params(&self) -> RwLockWriteGuard<'_, BTreeMap<String, PoolParams>> {
        match self.params.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Connection params lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn read_params(&self) -> RwLockReadGuard<'_, BTreeMap<String, PoolParams>> {
        match self.params.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Connection params lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl ResourceManager for ConnectionParamsManager {
    fn kind(&self) -> &str {
        self.inner.kind()
    }

    fn base_dir(&self) -> &Path {
        self.inner.base_dir()
    }

    fn states(&self) -> Vec<ResourceState> {
        self.inner.states()
    }

    fn state(&self, id: &str) -> Option<ResourceState> {
        self.inner.state(id)
    }

    fn update_resource_config(&self, id: &str, file: Option<&Path>) -> Result<(), ManagerError> {
        let Some(file) = file else {
            self.write_params().remove(id);
            self.inner.remove_state(id)?;
            log::debug!("{} '{}' removed", self.kind(), id);
            return Ok(());
        };

        let (mut state, mut error) = self.inner.load_state(id, file);
        if error.is_none() && state.status == ResourceStatus::Initialized {
            match read_pool_params(file) {
                Ok(params) => {
                    self.write_params().insert(id.to_string(), params);
                }
                Err(e) => {
                    state.status = ResourceStatus::Error(e.to_string());
                    error = Some(e);
                }
            }
        }
        if error.is_some() || state.status != ResourceStatus::Initialized {
            self.write_params().remove(id);
        }

        log::debug!(
            "{} '{}' -> {} ({})",
            self.kind(),
            id,
            state.status,
            file.display()
        );
        self.inner.store_state(id, state);
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn ownership(&self) -> Ownership {
        self.inner.ownership()
    }

    fn pool_lifecycle(&self) -> Option<&dyn PoolLifecycle> {
        Some(self)
    }
}

impl PoolLifecycle for ConnectionParamsManager {
    fn pool_params(&self, id: &str) -> Option<PoolParams> {
        self.read_params().get(id).cloned()
    }

    fn add_pool(&self, id: &str, params: &PoolParams) -> Result<(), PoolError> {
        self.pools.add_pool(id, params)
    }

    fn destroy_pool(&self, id: &str) -> Result<(), PoolError> {
        self.pools.destroy(id);
        Ok(())
    }
}

/// Reads connection parameters from a connection configuration file.
pub fn read_pool_params(file: &Path) -> Result<PoolParams, ManagerError> {
    let content = fs::read_to_string(file).map_err(|e| ManagerError::ReadConfig {
        path: file.to_path_buf(),
        source: e,
    })?;
    parse_pool_params(&content, file)
}

/// Parses connection parameters from XML content.
pub fn parse_pool_params(content: &str, path: &Path) -> Result<PoolParams, ManagerError> {
    let values = first_element_texts(
        content,
        &[
            URL_ELEMENT,
            USER_ELEMENT,
            PASSWORD_ELEMENT,
            MAX_CONNECTIONS_ELEMENT,
        ],
    )
    .map_err(|message| ManagerError::ParseConfig {
        path: path.to_path_buf(),
        message,
    })?;

    let url = values
        .get(URL_ELEMENT)
        .cloned()
        .ok_or_else(|| ManagerError::MissingParameter {
            path: path.to_path_buf(),
            name: URL_ELEMENT.to_string(),
        })?;

    let max_connections = match values.get(MAX_CONNECTIONS_ELEMENT) {
        Some(raw) => raw.parse::<u32>().map_err(|e| ManagerError::ParseConfig {
            path: path.to_path_buf(),
            message: format!("invalid {} '{}': {}", MAX_CONNECTIONS_ELEMENT, raw, e),
        })?,
        None => DEFAULT_MAX_CONNECTIONS,
    };

    Ok(PoolParams {
        url,
        user: values.get(USER_ELEMENT).cloned(),
        password: values.get(PASSWORD_ELEMENT).cloned(),
        max_connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONNECTION: &str = r#"<JDBCConnection>
  <Url>jdbc:postgresql://localhost:5432/gis</Url>
  <User>gis</User>
  <Password>secret</Password>
  <MaxConnections>4</MaxConnections>
</JDBCConnection>"#;

    fn params(url: &str) -> PoolParams {
        PoolParams {
            url: url.to_string(),
            user: None,
            password: None,
            max_connections: 2,
        }
    }

    #[test]
    fn test_parse_pool_params() {
        let params = parse_pool_params(CONNECTION, Path::new("conn1.xml")).unwrap();
        assert_eq!(params.url, "jdbc:postgresql://localhost:5432/gis");
        assert_eq!(params.user.as_deref(), Some("gis"));
        assert_eq!(params.password.as_deref(), Some("secret"));
        assert_eq!(params.max_connections, 4);
    }

    #[test]
    fn test_parse_pool_params_defaults_and_errors() {
        let params =
            parse_pool_params("<C><Url>jdbc:h2:mem</Url></C>", Path::new("c.xml")).unwrap();
        assert_eq!(params.max_connections, DEFAULT_MAX_CONNECTIONS);

        let missing = parse_pool_params("<C><User>x</User></C>", Path::new("c.xml"));
        assert!(matches!(missing, Err(ManagerError::MissingParameter { .. })));

        let bad = parse_pool_params(
            "<C><Url>u</Url><MaxConnections>many</MaxConnections></C>",
            Path::new("c.xml"),
        );
        assert!(matches!(bad, Err(ManagerError::ParseConfig { .. })));
    }

    #[test]
    fn test_pools_are_idempotent_by_id() {
        let pools = ConnectionPools::new();
        pools.add_pool("conn1", &params("jdbc:a")).unwrap();
        pools.add_pool("conn1", &params("jdbc:b")).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools.get("conn1").unwrap().params.url, "jdbc:b");

        assert!(pools.destroy("conn1"));
        assert!(!pools.destroy("conn1"));
        assert!(pools.is_empty());
    }

    #[test]
    fn test_invalid_pool_params_are_rejected() {
        let pools = ConnectionPools::new();
        assert!(matches!(
            pools.add_pool("conn1", &params(" ")),
            Err(PoolError::InvalidParams { .. })
        ));
        let mut zero = params("jdbc:a");
        zero.max_connections = 0;
        assert!(pools.add_pool("conn1", &zero).is_err());
        assert!(pools.is_empty());
    }

    #[test]
    fn test_manager_exposes_params_for_initialized_resources_only() {
        let dir = TempDir::new().unwrap();
        let pools = Arc::new(ConnectionPools::new());
        let manager = ConnectionParamsManager::new("jdbc", dir.path(), Arc::clone(&pools));

        let active = dir.path().join("conn1.xml");
        fs::write(&active, CONNECTION).unwrap();
        manager.update_resource_config("conn1", Some(&active)).unwrap();

        let inactive = dir.path().join("conn2.ignored");
        fs::write(&inactive, CONNECTION).unwrap();
        manager.update_resource_config("conn2", Some(&inactive)).unwrap();

        let broken = dir.path().join("conn3.xml");
        fs::write(&broken, "<JDBCConnection><User>x</User></JDBCConnection>").unwrap();
        assert!(manager
            .update_resource_config("conn3", Some(&broken))
            .is_err());

        let lifecycle = manager.pool_lifecycle().unwrap();
        assert!(lifecycle.pool_params("conn1").is_some());
        assert!(lifecycle.pool_params("conn2").is_none());
        assert!(lifecycle.pool_params("conn3").is_none());
        assert!(matches!(
            manager.state("conn3").unwrap().status,
            ResourceStatus::Error(_)
        ));
    }

    #[test]
    fn test_removal_forgets_params() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConnectionParamsManager::new("jdbc", dir.path(), Arc::new(ConnectionPools::new()));
        let file = dir.path().join("conn1.xml");
        fs::write(&file, CONNECTION).unwrap();

        manager.update_resource_config("conn1", Some(&file)).unwrap();
        manager.update_resource_config("conn1", None).unwrap();

        assert!(manager.pool_params("conn1").is_none());
        assert!(manager.states().is_empty());
    }

    #[test]
    fn test_references_are_tracked_as_dependencies() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConnectionParamsManager::new("jdbc", dir.path(), Arc::new(ConnectionPools::new()))
                .with_references(BTreeMap::from([(
                    "CredentialsId".to_string(),
                    "credentials".to_string(),
                )]))
                .with_soft_references(BTreeMap::from([(
                    "MonitorId".to_string(),
                    "monitor".to_string(),
                )]));
        let file = dir.path().join("conn1.xml");
        fs::write(
            &file,
            "<JDBCConnection><Url>jdbc:h2:mem</Url><CredentialsId>vault</CredentialsId>\
             <MonitorId>ops</MonitorId></JDBCConnection>",
        )
        .unwrap();

        manager.update_resource_config("conn1", Some(&file)).unwrap();

        let state = manager.state("conn1").unwrap();
        assert_eq!(
            state.dependencies,
            vec![crate::resource::ResourceIdentifier::new("credentials", "vault")]
        );
        assert_eq!(
            state.soft_dependencies,
            vec![crate::resource::ResourceIdentifier::new("monitor", "ops")]
        );
        assert!(manager.pool_params("conn1").is_some());
    }
}
