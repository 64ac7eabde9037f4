//! Decides which manager claims a workspace file and derives resource ids.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::resource::ResourceManager;

/// Filename suffix that marks a metadata-provider configuration.
pub const METADATA_SUFFIX: &str = "_metadata";

static RE_METADATA_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)_metadata\.(xml|ignored)$").unwrap());
static RE_BASE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\.(xml|ignored)$").unwrap());

/// Ownership predicate of a manager within its base directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ownership {
    /// Claims every file directly in the base directory.
    #[default]
    Any,
    /// Claims only metadata files (`*_metadata.xml`, `*_metadata.ignored`).
    MetadataOnly,
    /// Claims every file except metadata files.
    ExcludeMetadata,
}

impl Ownership {
    /// Applies the predicate to a bare filename.
    pub fn accepts(&self, file_name: &str) -> bool {
        match self {
            Ownership::Any => true,
            Ownership::MetadataOnly => is_metadata_file(file_name),
            Ownership::ExcludeMetadata => !is_metadata_file(file_name),
        }
    }

    /// Returns true if the two predicates can never accept the same filename.
    pub fn is_disjoint_with(&self, other: Ownership) -> bool {
        matches!(
            (self, other),
            (Ownership::MetadataOnly, Ownership::ExcludeMetadata)
                | (Ownership::ExcludeMetadata, Ownership::MetadataOnly)
        )
    }
}

/// Returns true for filenames of the metadata-suffixed pattern.
pub fn is_metadata_file(file_name: &str) -> bool {
    RE_METADATA_FILE.is_match(file_name)
}

/// Returns true if `manager` claims `file`.
///
/// The file's parent directory must equal the manager's base directory;
/// managers never claim files in subdirectories.
pub fn is_managed_by(manager: &dyn ResourceManager, file: &Path) -> bool {
    if file.parent() != Some(manager.base_dir()) {
        return false;
    }
    match file.file_name().and_then(|n| n.to_str()) {
        Some(name) => manager.ownership().accepts(name),
        None => false,
    }
}

/// Returns the index of the first registered manager claiming `file`.
pub fn owner_of(file: &Path, managers: &[Arc<dyn ResourceManager>]) -> Option<usize> {
    managers
        .iter()
        .position(|manager| is_managed_by(manager.as_ref(), file))
}

/// Derives the resource id from a configuration filename.
///
/// `layers_metadata.xml` → `layers`, `layers.xml` → `layers`,
/// `notes.txt` → `notes.txt`.
pub fn resource_id(file_name: &str) -> String {
    if let Some(caps) = RE_METADATA_FILE.captures(file_name) {
        return caps[1].to_string();
    }
    if let Some(caps) = RE_BASE_FILE.captures(file_name) {
        return caps[1].to_string();
    }
    file_name.to_string()
}

/// Derives the resource id from a configuration path.
pub fn resource_id_for(file: &Path) -> String {
    file.file_name()
        .map(|n| resource_id(&n.to_string_lossy()))
        .unwrap_or_default()
}
