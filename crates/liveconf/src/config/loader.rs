use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::schema::Settings;
use crate::error::SettingsError;

/// Loads and validates a settings file.
///
/// A relative `workspace` is resolved against the settings file's directory.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, SettingsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut settings = load_settings_from_str(&content)?;
    if settings.workspace.is_relative() {
        if let Some(parent) = path.parent() {
            settings.workspace = parent.join(&settings.workspace);
        }
    }
    Ok(settings)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, SettingsError> {
    let settings: Settings = serde_yaml::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.managers.is_empty() {
        return Err(SettingsError::Validation {
            message: "at least one manager must be registered".to_string(),
        });
    }

    if settings.watch.debounce_millis == 0 {
        return Err(SettingsError::Validation {
            message: "watch.debounceMillis must be greater than 0".to_string(),
        });
    }

    let mut kinds = HashSet::new();
    for manager in &settings.managers {
        if manager.kind.trim().is_empty() {
            return Err(SettingsError::Validation {
                message: "manager kind must not be empty".to_string(),
            });
        }
        if manager.kind.contains('/') {
            return Err(SettingsError::Validation {
                message: format!("manager kind '{}' must not contain '/'", manager.kind),
            });
        }
        if !kinds.insert(manager.kind.as_str()) {
            return Err(SettingsError::DuplicateKind(manager.kind.clone()));
        }
        validate_directory(&manager.kind, &manager.directory)?;
    }

    // Two managers may share a directory only if no file can match both.
    for (i, first) in settings.managers.iter().enumerate() {
        for second in &settings.managers[i + 1..] {
            if normalize(&first.directory) == normalize(&second.directory)
                && !first.ownership.is_disjoint_with(second.ownership)
            {
                return Err(SettingsError::OverlappingDirectory {
                    first: first.kind.clone(),
                    second: second.kind.clone(),
                    directory: first.directory.display().to_string(),
                });
            }
        }
    }

    Ok(())
}

fn validate_directory(kind: &str, directory: &Path) -> Result<(), SettingsError> {
    if directory.is_absolute() {
        return Err(SettingsError::Validation {
            message: format!(
                "directory of manager '{}' must be relative to the workspace",
                kind
            ),
        });
    }
    if directory
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SettingsError::Validation {
            message: format!(
                "directory of manager '{}' must not leave the workspace",
                kind
            ),
        });
    }
    Ok(())
}

fn normalize(directory: &Path) -> Vec<Component<'_>> {
    directory
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
