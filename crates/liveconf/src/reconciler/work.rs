//! Per-file work queue of a cycle and the report it produces.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::resource::ResourceIdentifier;
use crate::workspace::snapshot::FileDelta;

/// What a cycle has to do with one changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Add,
    Remove,
    Modify,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAction::Add => write!(f, "add"),
            FileAction::Remove => write!(f, "remove"),
            FileAction::Modify => write!(f, "modify"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    Pending,
    /// A manager took the file, whether or not it applied cleanly.
    Claimed,
}

/// Changed files of one cycle, each with its action and status.
#[derive(Debug, Clone, Default)]
pub struct PendingWork {
    items: BTreeMap<PathBuf, (FileAction, WorkStatus)>,
}

impl PendingWork {
    /// Queues every added, removed, and modified file of `delta`.
    pub fn from_delta(delta: &FileDelta) -> Self {
        let mut items = BTreeMap::new();
        for (files, action) in [
            (&delta.removed, FileAction::Remove),
            (&delta.modified, FileAction::Modify),
            (&delta.added, FileAction::Add),
        ] {
            for path in files {
                items.insert(path.clone(), (action, WorkStatus::Pending));
            }
        }
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if `path` is queued for `action` and not yet claimed.
    pub fn is_pending(&self, path: &Path, action: FileAction) -> bool {
        matches!(
            self.items.get(path),
            Some((a, WorkStatus::Pending)) if *a == action
        )
    }

    /// Marks `path` claimed. Returns false if it was not pending.
    pub fn claim(&mut self, path: &Path) -> bool {
        match self.items.get_mut(path) {
            Some((_, status)) if *status == WorkStatus::Pending => {
                *status = WorkStatus::Claimed;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, path: &Path) -> Option<WorkStatus> {
        self.items.get(path).map(|(_, status)| *status)
    }

    /// Pending files for `action`, sorted.
    pub fn pending(&self, action: FileAction) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter(|(_, (a, s))| *a == action && *s == WorkStatus::Pending)
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Every file still pending, sorted by path.
    pub fn unclaimed(&self) -> Vec<(PathBuf, FileAction)> {
        self.items
            .iter()
            .filter(|(_, (_, s))| *s == WorkStatus::Pending)
            .map(|(p, (a, _))| (p.clone(), *a))
            .collect()
    }
}

/// Result of one file in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    Applied {
        resource: ResourceIdentifier,
    },
    Failed {
        resource: ResourceIdentifier,
        reason: String,
    },
    /// No manager claimed the file.
    Unclaimed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    pub action: FileAction,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, Outcome::Applied { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolOperation {
    Destroy,
    Create,
}

impl fmt::Display for PoolOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolOperation::Destroy => write!(f, "destroy"),
            PoolOperation::Create => write!(f, "create"),
        }
    }
}

/// One pool teardown or creation performed in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOutcome {
    pub kind: String,
    pub id: String,
    pub operation: PoolOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PoolOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Structured audit of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unmodified: usize,
    /// Outcomes of changed files, in processing order.
    pub files: Vec<FileOutcome>,
    pub pools: Vec<PoolOutcome>,
}

impl ReconcileReport {
    pub(crate) fn new(cycle_id: Uuid, started_at: DateTime<Utc>, delta: &FileDelta) -> Self {
        Self {
            cycle_id,
            started_at,
            duration_ms: 0,
            added: delta.added.len(),
            removed: delta.removed.len(),
            modified: delta.modified.len(),
            unmodified: delta.unmodified.len(),
            files: Vec::new(),
            pools: Vec::new(),
        }
    }

    pub fn total_changes(&self) -> usize {
        self.added + self.removed + self.modified
    }

    /// Files that failed or that no manager claimed.
    pub fn unreconciled(&self) -> Vec<&FileOutcome> {
        self.files.iter().filter(|f| !f.is_applied()).collect()
    }

    pub fn applied(&self) -> usize {
        self.files.iter().filter(|f| f.is_applied()).count()
    }

    pub fn failed_pools(&self) -> Vec<&PoolOutcome> {
        self.pools.iter().filter(|p| !p.is_ok()).collect()
    }

    /// Returns true when every changed file applied and every pool swap succeeded.
    pub fn is_clean(&self) -> bool {
        self.files.iter().all(FileOutcome::is_applied) && self.pools.iter().all(PoolOutcome::is_ok)
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} new, {} removed, {} modified: {} applied, {} unreconciled, {} pool operations ({} failed)",
            self.added,
            self.removed,
            self.modified,
            self.applied(),
            self.unreconciled().len(),
            self.pools.len(),
            self.failed_pools().len()
        )
    }

    /// Renders the audit block: counts, then one line per file and pool.
    pub fn audit(&self) -> String {
        let mut block = format!("Reconcile cycle {}: {}\n", self.cycle_id, self.summary());
        for file in &self.files {
            let line = match &file.outcome {
                Outcome::Applied { resource } => {
                    format!("  {} {}: {}", file.action, resource, file.path.display())
                }
                Outcome::Failed { resource, reason } => format!(
                    "  FAILED {} {}: {} ({})",
                    file.action,
                    resource,
                    file.path.display(),
                    reason
                ),
                Outcome::Unclaimed => {
                    format!("  NOT {}: {}", past_tense(file.action), file.path.display())
                }
            };
            block.push_str(&line);
            block.push('\n');
        }
        for pool in &self.pools {
            match &pool.error {
                None => block.push_str(&format!(
                    "  pool {} {}/{}\n",
                    pool.operation, pool.kind, pool.id
                )),
                Some(e) => block.push_str(&format!(
                    "  FAILED pool {} {}/{}: {}\n",
                    pool.operation, pool.kind, pool.id, e
                )),
            }
        }
        block
    }

    /// Logs the audit block once: warn if anything is unreconciled, info if
    /// clean, debug if nothing changed.
    pub fn log(&self) {
        let block = self.audit();
        let block = block.trim_end();
        if !self.is_clean() {
            log::warn!("{}", block);
        } else if self.total_changes() == 0 && self.pools.is_empty() {
            log::debug!("{}", block);
        } else {
            log::info!("{}", block);
        }
    }
}

fn past_tense(action: FileAction) -> &'static str {
    match action {
        FileAction::Add => "added",
        FileAction::Remove => "removed",
        FileAction::Modify => "updated",
    }
}
