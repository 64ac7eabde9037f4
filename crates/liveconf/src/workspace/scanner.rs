use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ScanSettings;
use crate::error::{ReconcileError, Result};

/// Reserved directory holding pre-parsed schema assets.
pub const DEFAULT_RESERVED_SEGMENTS: &[&str] = &["appschemas"];

/// Files reserved for internal caches or workspace bootstrap.
pub const DEFAULT_IGNORED_FILES: &[&str] = &["bbox_cache.properties", "main.xml"];

/// A regular file found under the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified: u64,
}

/// Exclusion rules applied while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    /// A file below a directory with one of these names is not a resource.
    pub reserved_segments: Vec<String>,
    /// Filenames that are never resources, wherever they are.
    pub ignored_files: Vec<String>,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            reserved_segments: DEFAULT_RESERVED_SEGMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignored_files: DEFAULT_IGNORED_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&ScanSettings> for ScanRules {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            reserved_segments: settings.reserved_segments.clone(),
            ignored_files: settings.ignored_files.clone(),
        }
    }
}

impl ScanRules {
    /// Returns true if `path` (below `root`) must not be managed.
    pub fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.ignored_files.iter().any(|f| f == name) {
                return true;
            }
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| self.reserved_segments.iter().any(|r| r == s))
                .unwrap_or(false)
        })
    }
}

/// Recursively lists the managed files of a workspace directory.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceScanner {
    rules: ScanRules,
}

impl WorkspaceScanner {
    pub fn new(rules: ScanRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// Scans `root` depth-first, following symbolic links.
    ///
    /// An absent root yields an empty list and dangling links are skipped.
    /// Any other enumeration error, a link loop included, fails the whole scan.
    pub fn scan(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        if !root.exists() {
            debug!("Workspace directory {} does not exist", root.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_vanished(&e) => {
                    warn!(
                        "Skipping vanished or dangling entry: {}",
                        e.path().unwrap_or(root).display()
                    );
                    continue;
                }
                Err(e) => {
                    return Err(ReconcileError::ScanFailed {
                        path: e
                            .path()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| root.to_path_buf()),
                        source: e,
                    })
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.rules.is_excluded(root, path) {
                debug!("Skipping excluded file: {}", path.display());
                continue;
            }

            let metadata = entry.metadata().map_err(|e| ReconcileError::ScanFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            let modified = metadata
                .modified()
                .map_err(|e| ReconcileError::ReadMetadata {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            files.push(ScannedFile {
                path: path.to_path_buf(),
                modified: modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0),
            });
        }

        info!("Scanned {} files in {}", files.len(), root.display());
        Ok(files)
    }
}

/// A below-root entry that no longer resolves: deleted mid-scan or a dangling link.
fn is_vanished(error: &walkdir::Error) -> bool {
    error.depth() > 0
        && error.loop_ancestor().is_none()
        && error
            .io_error()
            .map(|e| e.kind() == std::io::ErrorKind::NotFound)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"<x/>").unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceScanner::default().scan(dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_scan_absent_directory() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceScanner::default()
            .scan(&dir.path().join("missing"))
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_scan_is_recursive_with_timestamps() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("jdbc/conn1.xml"), 100);
        touch(&dir.path().join("datasources/feature/roads.xml"), 200);

        let files = WorkspaceScanner::default().scan(dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].path,
            dir.path().join("datasources/feature/roads.xml")
        );
        assert_eq!(files[0].modified, 200_000);
        assert_eq!(files[1].path, dir.path().join("jdbc/conn1.xml"));
        assert_eq!(files[1].modified, 100_000);
    }

    #[test]
    fn test_scan_applies_exclusions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("main.xml"), 1);
        touch(&dir.path().join("datasources/feature/bbox_cache.properties"), 1);
        touch(&dir.path().join("appschemas/roads.xsd"), 1);
        touch(&dir.path().join("datasources/feature/appschemas/inner.xsd"), 1);
        touch(&dir.path().join("datasources/feature/roads.xml"), 1);

        let files = WorkspaceScanner::default().scan(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("roads.xml"));
    }

    #[test]
    fn test_reserved_segment_matches_whole_components() {
        let rules = ScanRules::default();
        let root = Path::new("/ws");
        assert!(rules.is_excluded(root, Path::new("/ws/appschemas/a.xsd")));
        assert!(!rules.is_excluded(root, Path::new("/ws/myappschemas/a.xml")));
        // Only the part below the root is inspected.
        assert!(!rules.is_excluded(
            Path::new("/srv/appschemas/ws"),
            Path::new("/srv/appschemas/ws/jdbc/c.xml")
        ));
    }

    #[test]
    fn test_custom_rules() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("cache/a.xml"), 1);
        touch(&dir.path().join("notes.txt"), 1);
        touch(&dir.path().join("main.xml"), 1);

        let scanner = WorkspaceScanner::new(ScanRules {
            reserved_segments: vec!["cache".into()],
            ignored_files: vec!["notes.txt".into()],
        });
        let files = scanner.scan(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("main.xml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_scanned_with_target_timestamp() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        touch(&dir.path().join("real/conn1.xml"), 300);
        fs::create_dir_all(ws.join("jdbc")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real/conn1.xml"), ws.join("jdbc/conn1.xml"))
            .unwrap();

        let files = WorkspaceScanner::default().scan(&ws).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, ws.join("jdbc/conn1.xml"));
        assert_eq!(files[0].modified, 300_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_descended() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        touch(&dir.path().join("mounted/conn1.xml"), 1);
        fs::create_dir_all(&ws).unwrap();
        std::os::unix::fs::symlink(dir.path().join("mounted"), ws.join("jdbc")).unwrap();

        let files = WorkspaceScanner::default().scan(&ws).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, ws.join("jdbc/conn1.xml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("jdbc/conn1.xml"), 1);
        std::os::unix::fs::symlink(dir.path().join("gone.xml"), dir.path().join("jdbc/conn2.xml"))
            .unwrap();

        let files = WorkspaceScanner::default().scan(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("conn1.xml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_fails_scan() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("jdbc/conn1.xml"), 1);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("jdbc/loop")).unwrap();

        let result = WorkspaceScanner::default().scan(dir.path());

        assert!(matches!(result, Err(ReconcileError::ScanFailed { .. })));
    }
}
