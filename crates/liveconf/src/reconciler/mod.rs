//! Workspace reconciler: scan → diff → apply → refresh → audit.
//!
//! One cycle runs at a time. Removals and modifications are applied for
//! every manager before any addition, so a file renamed within or moved
//! between manager directories is released before it is claimed again.
//! Pool teardown and creation run once at the end of the cycle, after all
//! managers have seen their files.

pub mod work;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ManagerError, PoolError, Result};
use crate::resource::{PoolLifecycle, ResourceIdentifier};
use crate::workspace::ownership::{is_managed_by, resource_id_for};
use crate::workspace::scanner::{ScanRules, WorkspaceScanner};
use crate::workspace::snapshot::{FileDelta, WorkspaceSnapshot};
use crate::workspace::Workspace;

pub use work::{
    FileAction, FileOutcome, Outcome, PendingWork, PoolOperation, PoolOutcome, ReconcileReport,
    WorkStatus,
};

#[derive(Debug, Default)]
struct ReconcilerState {
    snapshot: WorkspaceSnapshot,
    location: Option<PathBuf>,
    /// Pools whose creation failed, by manager kind and id.
    pool_retries: BTreeSet<(String, String)>,
}

/// Pool work collected for one pool-capable manager during a cycle.
#[derive(Debug, Default)]
struct PoolPlan {
    teardown: BTreeSet<String>,
    create: BTreeSet<String>,
}

/// Applies workspace file changes to its resource managers.
///
/// Owns the snapshot of the workspace it reconciles; construct one per
/// host and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct WorkspaceReconciler {
    scanner: WorkspaceScanner,
    state: Mutex<ReconcilerState>,
}

impl WorkspaceReconciler {
    /// Creates a reconciler with the default scan rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ScanRules) -> Self {
        Self {
            scanner: WorkspaceScanner::new(rules),
            state: Mutex::new(ReconcilerState::default()),
        }
    }

    pub fn scanner(&self) -> &WorkspaceScanner {
        &self.scanner
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Reconciler lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Records `workspace` and its current files as the baseline.
    pub fn init(&self, workspace: &Workspace) -> Result<()> {
        let mut state = self.lock();
        let files = self.scanner.scan(workspace.location())?;
        state.snapshot = WorkspaceSnapshot::from_scan(&files);
        state.location = Some(workspace.location().to_path_buf());
        state.pool_retries.clear();
        log::info!(
            "Workspace baseline at {}: {} files",
            workspace.location().display(),
            state.snapshot.len()
        );
        Ok(())
    }

    /// Returns true if `workspace` lives elsewhere than the last one seen,
    /// and records its location.
    pub fn is_workspace_change(&self, workspace: &Workspace) -> bool {
        let mut state = self.lock();
        if state.location.as_deref() == Some(workspace.location()) {
            return false;
        }
        log::info!(
            "Workspace changed to {}",
            workspace.location().display()
        );
        state.location = Some(workspace.location().to_path_buf());
        true
    }

    /// Discards the baseline and records the current files of `workspace`.
    pub fn notify_workspace_change(&self, workspace: &Workspace) -> Result<()> {
        let mut state = self.lock();
        let files = self.scanner.scan(workspace.location())?;
        state.snapshot = WorkspaceSnapshot::from_scan(&files);
        state.pool_retries.clear();
        log::debug!(
            "Reset baseline for {}: {} files",
            workspace.location().display(),
            state.snapshot.len()
        );
        Ok(())
    }

    /// Runs one reconciliation cycle.
    ///
    /// Only a failed scan is returned as an error; the baseline is then left
    /// untouched. Manager and pool failures are reported in the result.
    pub fn update_workspace(&self, workspace: &Workspace) -> Result<ReconcileReport> {
        let mut state = self.lock();
        self.run_cycle(&mut state, workspace)
    }

    /// Loads every file of `workspace` as new, starting from an empty baseline.
    pub fn start(&self, workspace: &Workspace) -> Result<ReconcileReport> {
        let mut state = self.lock();
        state.snapshot = WorkspaceSnapshot::new();
        state.location = Some(workspace.location().to_path_buf());
        state.pool_retries.clear();
        self.run_cycle(&mut state, workspace)
    }

    /// Resets the baseline on a workspace change, otherwise runs a cycle.
    ///
    /// Returns `None` when the baseline was reset.
    pub fn reconcile(&self, workspace: &Workspace) -> Result<Option<ReconcileReport>> {
        if self.is_workspace_change(workspace) {
            self.notify_workspace_change(workspace)?;
            return Ok(None);
        }
        self.update_workspace(workspace).map(Some)
    }

    /// Copy of the current baseline.
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        self.lock().snapshot.clone()
    }

    /// Pools awaiting another creation attempt, as `(kind, id)`.
    pub fn pending_pool_retries(&self) -> Vec<(String, String)> {
        self.lock().pool_retries.iter().cloned().collect()
    }

    fn run_cycle(
        &self,
        state: &mut ReconcilerState,
        workspace: &Workspace,
    ) -> Result<ReconcileReport> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "reconcile.cycle",
            cycle_id = %cycle_id,
            workspace = %workspace.location().display()
        );
        let _enter = span.enter();
        let started_at = Utc::now();
        let timer = Instant::now();

        let files = self.scanner.scan(workspace.location())?;
        let current = WorkspaceSnapshot::from_scan(&files);
        let delta = FileDelta::between(&state.snapshot, &current);
        delta.log();

        let mut report = ReconcileReport::new(cycle_id, started_at, &delta);
        let mut work = PendingWork::from_delta(&delta);
        let mut plans: BTreeMap<usize, PoolPlan> = BTreeMap::new();

        if !work.is_empty() {
            self.apply_removals_and_modifications(workspace, &mut work, &mut plans, &mut report);
            self.apply_additions(workspace, &mut work, &mut plans, &mut report);
        }
        self.apply_pool_changes(workspace, state, plans, &mut report);

        state.snapshot = current;

        for (path, action) in work.unclaimed() {
            report.files.push(FileOutcome {
                path,
                action,
                outcome: Outcome::Unclaimed,
            });
        }

        report.duration_ms = timer.elapsed().as_millis() as u64;
        report.log();
        Ok(report)
    }

    /// Visits each manager's existing states and applies removed and
    /// modified backing files.
    fn apply_removals_and_modifications(
        &self,
        workspace: &Workspace,
        work: &mut PendingWork,
        plans: &mut BTreeMap<usize, PoolPlan>,
        report: &mut ReconcileReport,
    ) {
        for (index, manager) in workspace.managers().iter().enumerate() {
            let pool_capable = manager.pool_lifecycle().is_some();

            for resource in manager.states() {
                let path = resource.config_location.clone();
                let id = resource.id().to_string();

                if work.is_pending(&path, FileAction::Remove) {
                    work.claim(&path);
                    let result = manager.update_resource_config(&id, None);
                    if pool_capable {
                        plans.entry(index).or_default().teardown.insert(id);
                    }
                    report.files.push(file_outcome(
                        path,
                        FileAction::Remove,
                        resource.identifier,
                        result,
                    ));
                } else if work.is_pending(&path, FileAction::Modify) {
                    work.claim(&path);
                    let result = manager.update_resource_config(&id, Some(&path));
                    if pool_capable {
                        let plan = plans.entry(index).or_default();
                        plan.teardown.insert(id.clone());
                        if result.is_ok() {
                            plan.create.insert(id);
                        }
                    }
                    report.files.push(file_outcome(
                        path,
                        FileAction::Modify,
                        resource.identifier,
                        result,
                    ));
                }
            }
        }
    }

    /// Offers every still-pending added file to the managers in order.
    fn apply_additions(
        &self,
        workspace: &Workspace,
        work: &mut PendingWork,
        plans: &mut BTreeMap<usize, PoolPlan>,
        report: &mut ReconcileReport,
    ) {
        for (index, manager) in workspace.managers().iter().enumerate() {
            for path in work.pending(FileAction::Add) {
                if !is_managed_by(manager.as_ref(), &path) {
                    continue;
                }
                work.claim(&path);

                let id = resource_id_for(&path);
                let result = manager.update_resource_config(&id, Some(&path));
                if result.is_ok() && manager.pool_lifecycle().is_some() {
                    plans.entry(index).or_default().create.insert(id.clone());
                }
                report.files.push(file_outcome(
                    path,
                    FileAction::Add,
                    ResourceIdentifier::new(manager.kind(), id),
                    result,
                ));
            }
        }
    }

    /// Destroys collected pools, then creates collected and retried ones.
    fn apply_pool_changes(
        &self,
        workspace: &Workspace,
        state: &mut ReconcilerState,
        mut plans: BTreeMap<usize, PoolPlan>,
        report: &mut ReconcileReport,
    ) {
        for (index, manager) in workspace.managers().iter().enumerate() {
            let Some(pools) = manager.pool_lifecycle() else {
                continue;
            };
            let kind = manager.kind().to_string();
            let plan = plans.remove(&index).unwrap_or_default();

            for id in &plan.teardown {
                state.pool_retries.remove(&(kind.clone(), id.clone()));
                let result = pools.destroy_pool(id);
                report
                    .pools
                    .push(pool_outcome(&kind, id, PoolOperation::Destroy, result));
            }

            let mut create = plan.create;
            create.extend(
                state
                    .pool_retries
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, id)| id.clone()),
            );

            for id in create {
                let key = (kind.clone(), id.clone());
                match create_pool(pools, &id) {
                    None => {
                        log::debug!("No pool parameters for {}/{}, no pool created", kind, id);
                        state.pool_retries.remove(&key);
                    }
                    Some(Ok(())) => {
                        state.pool_retries.remove(&key);
                        report
                            .pools
                            .push(pool_outcome(&kind, &id, PoolOperation::Create, Ok(())));
                    }
                    Some(Err(e)) => {
                        state.pool_retries.insert(key);
                        report
                            .pools
                            .push(pool_outcome(&kind, &id, PoolOperation::Create, Err(e)));
                    }
                }
            }
        }
    }
}

fn create_pool(
    pools: &dyn PoolLifecycle,
    id: &str,
) -> Option<std::result::Result<(), PoolError>> {
    let params = pools.pool_params(id)?;
    Some(pools.add_pool(id, &params))
}

fn file_outcome(
    path: PathBuf,
    action: FileAction,
    resource: ResourceIdentifier,
    result: std::result::Result<(), ManagerError>,
) -> FileOutcome {
    let outcome = match result {
        Ok(()) => Outcome::Applied { resource },
        Err(e) => {
            log::debug!("{} {} failed: {}", action, resource, e);
            Outcome::Failed {
                resource,
                reason: e.to_string(),
            }
        }
    };
    FileOutcome {
        path,
        action,
        outcome,
    }
}

fn pool_outcome(
    kind: &str,
    id: &str,
    operation: PoolOperation,
    result: std::result::Result<(), PoolError>,
) -> PoolOutcome {
    PoolOutcome {
        kind: kind.to_string(),
        id: id.to_string(),
        operation,
        error: result.err().map(|e| e.to_string()),
    }
}
