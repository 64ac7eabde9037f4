//! Resource model and the manager capability traits.
//!
//! A resource is a named, typed runtime object backed by exactly one
//! configuration file. Each resource *kind* is owned by one
//! [`ResourceManager`] bound to one base directory. Managers that also own
//! live connection pools expose the [`PoolLifecycle`] capability.

pub mod directory;
pub mod pool;
pub mod xml;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ManagerError, PoolError};
use crate::workspace::ownership::Ownership;

pub use directory::DirectoryManager;
pub use pool::{ConnectionParamsManager, ConnectionPool, ConnectionPools};

/// Logical name of a resource, scoped by the kind of its owning manager.
///
/// `foo.xml` and `foo_metadata.xml` both derive the id `foo` but belong to
/// different managers, so the kind is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Kind of the owning manager.
    pub kind: String,
    /// Id derived from the configuration filename.
    pub id: String,
}

impl ResourceIdentifier {
    /// Creates a new identifier.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl std::str::FromStr for ResourceIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(format!("Invalid resource identifier '{}', expected kind/id", s)),
        }
    }
}

/// Lifecycle status of a resource as reported by its manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum ResourceStatus {
    /// Configuration was read and the resource is live.
    Initialized,
    /// Configuration file carries the `.ignored` extension.
    Deactivated,
    /// Configuration could not be applied.
    Error(String),
}

impl ResourceStatus {
    /// Returns true unless the resource is errored.
    pub fn is_ok(&self) -> bool {
        !matches!(self, ResourceStatus::Error(_))
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Initialized => write!(f, "initialized"),
            ResourceStatus::Deactivated => write!(f, "deactivated"),
            ResourceStatus::Error(_) => write!(f, "error"),
        }
    }
}

/// Runtime record of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    pub identifier: ResourceIdentifier,
    /// The configuration file backing this resource.
    pub config_location: PathBuf,
    pub status: ResourceStatus,
    /// Resources that must exist before this one is usable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ResourceIdentifier>,
    /// Ordering hints that do not block this resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft_dependencies: Vec<ResourceIdentifier>,
}

impl ResourceState {
    /// Creates a state with no dependencies.
    pub fn new(
        identifier: ResourceIdentifier,
        config_location: impl Into<PathBuf>,
        status: ResourceStatus,
    ) -> Self {
        Self {
            identifier,
            config_location: config_location.into(),
            status,
            dependencies: Vec::new(),
            soft_dependencies: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.identifier.id
    }
}

/// Connection parameters for a pool-capable resource.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolParams {
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub max_connections: u32,
}

/// Default pool size when the configuration does not name one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

impl fmt::Debug for PoolParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolParams")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// A collaborator owning the lifecycle of one resource kind within one base
/// directory.
///
/// Implementations synchronize their own state collections; the reconciler
/// calls these methods synchronously and treats the collection as opaque.
pub trait ResourceManager: Send + Sync {
    /// The resource kind this manager owns.
    fn kind(&self) -> &str;

    /// Only files directly inside this directory may be claimed.
    fn base_dir(&self) -> &Path;

    /// Snapshot of the current resource states, ordered by id.
    fn states(&self) -> Vec<ResourceState>;

    /// Returns the state of one resource.
    fn state(&self, id: &str) -> Option<ResourceState> {
        self.states().into_iter().find(|s| s.id() == id)
    }

    /// Creates, updates, or (with `None`) removes the configuration of `id`.
    fn update_resource_config(&self, id: &str, file: Option<&Path>) -> Result<(), ManagerError>;

    /// Which files in the base directory this manager claims.
    fn ownership(&self) -> Ownership {
        Ownership::Any
    }

    /// Pool lifecycle capability, for managers owning connection pools.
    fn pool_lifecycle(&self) -> Option<&dyn PoolLifecycle> {
        None
    }
}

/// Capability of managers that own live connection pools keyed by resource id.
pub trait PoolLifecycle: Send + Sync {
    /// The manager's current parameters for `id`, if a pool should exist.
    fn pool_params(&self, id: &str) -> Option<PoolParams>;

    /// Creates (or replaces) the pool for `id`.
    fn add_pool(&self, id: &str, params: &PoolParams) -> Result<(), PoolError>;

    /// Destroys the pool for `id`. Unknown ids are a no-op.
    fn destroy_pool(&self, id: &str) -> Result<(), PoolError>;
}
