//! Background loop running reconciliation cycles on triggers and ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::Interval;

use crate::reconciler::{ReconcileReport, WorkspaceReconciler};
use crate::workspace::Workspace;

/// Runs cycles for one workspace on a background thread.
///
/// A cycle starts on every trigger and, if an interval is set, on every
/// tick. Triggers that arrive while a cycle runs are coalesced into one
/// follow-up cycle. Each report is published on [`subscribe`](Self::subscribe).
pub struct ReconcileScheduler {
    reconciler: Arc<WorkspaceReconciler>,
    workspace: Arc<Workspace>,
    interval: Option<Duration>,
    shutdown: Arc<AtomicBool>,
    reports: broadcast::Sender<ReconcileReport>,
}

impl ReconcileScheduler {
    /// Creates a scheduler; `interval` of `None` disables periodic cycles.
    pub fn new(
        reconciler: Arc<WorkspaceReconciler>,
        workspace: Arc<Workspace>,
        interval: Option<Duration>,
    ) -> Self {
        let (reports, _) = broadcast::channel(16);
        Self {
            reconciler,
            workspace,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            reports,
        }
    }

    /// Reports of completed cycles.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileReport> {
        self.reports.subscribe()
    }

    /// Starts the loop in a background thread.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        let workspace = Arc::clone(&self.workspace);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let reports = self.reports.clone();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start scheduler runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut timer = interval.map(tokio::time::interval);
                if let Some(timer) = timer.as_mut() {
                    timer.tick().await; // skip immediate first tick
                }
                let mut triggers_open = true;

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = tick(&mut timer) => {
                            log::debug!("Periodic reconcile");
                        },
                        result = trigger_rx.recv(), if triggers_open => match result {
                            Ok(()) => log::debug!("Reconcile triggered"),
                            Err(RecvError::Lagged(n)) => {
                                log::debug!("Reconcile triggered ({} triggers coalesced)", n)
                            }
                            Err(RecvError::Closed) => {
                                triggers_open = false;
                                if timer.is_none() {
                                    break;
                                }
                                continue;
                            }
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    // One cycle covers every change made so far.
                    loop {
                        match trigger_rx.try_recv() {
                            Ok(()) | Err(TryRecvError::Lagged(_)) => {}
                            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                        }
                    }

                    match reconciler.reconcile(&workspace) {
                        Ok(Some(report)) => {
                            if reports.send(report).is_err() {
                                log::trace!("No report listeners active");
                            }
                        }
                        Ok(None) => log::info!("Workspace baseline reset"),
                        Err(e) => log::error!("Reconcile cycle failed: {}", e),
                    }
                }
            });
        })
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
