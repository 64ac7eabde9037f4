//! Generic file-backed resource manager.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ManagerError;
use crate::workspace::ownership::Ownership;

use super::xml::extract_references;
use super::{ResourceIdentifier, ResourceManager, ResourceState, ResourceStatus};

/// Extension of deactivated resource configurations.
pub const IGNORED_EXTENSION: &str = "ignored";

/// Manages one resource kind backed by XML files in one directory.
///
/// A configuration is read when created or updated and scanned for reference
/// elements naming other resources; the resource content itself is opaque.
/// `.ignored` files are tracked as deactivated resources without being read.
#[derive(Debug)]
pub struct DirectoryManager {
    kind: String,
    base_dir: PathBuf,
    ownership: Ownership,
    /// Element name → kind of the referenced resource (hard dependencies).
    references: BTreeMap<String, String>,
    /// Element name → kind of the referenced resource (soft dependencies).
    soft_references: BTreeMap<String, String>,
    states: RwLock<BTreeMap<String, ResourceState>>,
}

impl DirectoryManager {
    /// Creates a manager claiming every file in `base_dir`.
    pub fn new(kind: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind: kind.into(),
            base_dir: base_dir.into(),
            ownership: Ownership::Any,
            references: BTreeMap::new(),
            soft_references: BTreeMap::new(),
            states: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Declares that `element` holds the id of a resource of `kind` this
    /// resource hard-depends on.
    pub fn with_reference(mut self, element: impl Into<String>, kind: impl Into<String>) -> Self {
        self.references.insert(element.into(), kind.into());
        self
    }

    /// Declares a soft-dependency reference element.
    pub fn with_soft_reference(
        mut self,
        element: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        self.soft_references.insert(element.into(), kind.into());
        self
    }

    pub fn with_references(mut self, references: BTreeMap<String, String>) -> Self {
        self.references.extend(references);
        self
    }

    pub fn with_soft_references(mut self, references: BTreeMap<String, String>) -> Self {
        self.soft_references.extend(references);
        self
    }

    /// Returns the number of tracked resources.
    pub fn len(&self) -> usize {
        self.read_states().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_states().is_empty()
    }

    fn read_states(&self) -> RwLockReadGuard<'_, BTreeMap<String, ResourceState>> {
        match self.states.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("{} manager state lock was poisoned, recovering", self.kind);
                poisoned.into_inner()
            }
        }
    }

    fn write_states(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ResourceState>> {
        match self.states.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("{} manager state lock was poisoned, recovering", self.kind);
                poisoned.into_inner()
            }
        }
    }

    /// Reads `file` and builds the state it describes.
    ///
    /// Returns the state to store together with the error to report, if any;
    /// a failed configuration is still tracked with an error status.
    pub(crate) fn load_state(
        &self,
        id: &str,
        file: &Path,
    ) -> (ResourceState, Option<ManagerError>) {
        let identifier = ResourceIdentifier::new(self.kind.clone(), id);

        if is_ignored(file) {
            return (
                ResourceState::new(identifier, file, ResourceStatus::Deactivated),
                None,
            );
        }

        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                let state =
                    ResourceState::new(identifier, file, ResourceStatus::Error(e.to_string()));
                return (
                    state,
                    Some(ManagerError::ReadConfig {
                        path: file.to_path_buf(),
                        source: e,
                    }),
                );
            }
        };

        let references = extract_references(&content, &self.references).and_then(|hard| {
            extract_references(&content, &self.soft_references).map(|soft| (hard, soft))
        });

        match references {
            Ok((dependencies, soft_dependencies)) => {
                let mut state = ResourceState::new(identifier, file, ResourceStatus::Initialized);
                state.dependencies = dependencies;
                state.soft_dependencies = soft_dependencies;
                (state, None)
            }
            Err(message) => {
                let state =
                    ResourceState::new(identifier, file, ResourceStatus::Error(message.clone()));
                (
                    state,
                    Some(ManagerError::ParseConfig {
                        path: file.to_path_buf(),
                        message,
                    }),
                )
            }
        }
    }

    /// Stores a state built by [`load_state`](Self::load_state).
    pub(crate) fn store_state(&self, id: &str, state: ResourceState) {
        self.write_states().insert(id.to_string(), state);
    }

    /// Drops the state of `id`.
    pub(crate) fn remove_state(&self, id: &str) -> Result<ResourceState, ManagerError> {
        self.write_states()
            .remove(id)
            .ok_or_else(|| ManagerError::UnknownResource {
                kind: self.kind.clone(),
                id: id.to_string(),
            })
    }
}

impl ResourceManager for DirectoryManager {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn states(&self) -> Vec<ResourceState> {
        self.read_states().values().cloned().collect()
    }

    fn state(&self, id: &str) -> Option<ResourceState> {
        self.read_states().get(id).cloned()
    }

    fn update_resource_config(&self, id: &str, file: Option<&Path>) -> Result<(), ManagerError> {
        match file {
            Some(file) => {
                let (state, error) = self.load_state(id, file);
                log::debug!(
                    "{} '{}' -> {} ({})",
                    self.kind,
                    id,
                    state.status,
                    file.display()
                );
                self.store_state(id, state);
                match error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            None => {
                self.remove_state(id)?;
                log::debug!("{} '{}' removed", self.kind, id);
                Ok(())
            }
        }
    }

    fn ownership(&self) -> Ownership {
        self.ownership
    }
}

/// Returns true for deactivated (`.ignored`) configuration files.
pub fn is_ignored(file: &Path) -> bool {
    file.extension().and_then(|e| e.to_str()) == Some(IGNORED_EXTENSION)
}
