use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use liveconf::{
    AsyncWorkspaceWatcher, ReconcileReport, ReconcileScheduler, WorkspaceWatcher,
};

use super::LoadedWorkspace;
use crate::cli::{GlobalArgs, WatchArgs};

pub fn execute(args: &WatchArgs, global: &GlobalArgs) -> Result<()> {
    let LoadedWorkspace {
        settings,
        settings_path,
        workspace,
        reconciler,
    } = LoadedWorkspace::open(global)?;

    let workspace = Arc::new(workspace);
    let reconciler = Arc::new(reconciler);

    let report = reconciler
        .start(&workspace)
        .with_context(|| format!("Failed to load workspace {}", workspace.location().display()))?;
    print_cycle(&report);

    let poll_secs = args
        .poll_interval
        .unwrap_or(settings.watch.poll_interval_secs);
    let interval = (poll_secs > 0).then(|| Duration::from_secs(poll_secs));

    let mut watcher = AsyncWorkspaceWatcher::new(
        WorkspaceWatcher::new(workspace.location(), (&settings.scan).into())
            .with_debounce(Duration::from_millis(settings.watch.debounce_millis)),
    );
    let scheduler =
        ReconcileScheduler::new(Arc::clone(&reconciler), Arc::clone(&workspace), interval);
    let mut reports = scheduler.subscribe();
    let handle = scheduler.start(watcher.subscribe());
    watcher.start();

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    log::info!(
        "Watching {} (settings {}), press Ctrl-C to stop",
        workspace.location().display(),
        settings_path.display()
    );

    loop {
        match stop_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        drain_reports(&mut reports);
    }

    log::info!("Shutting down");
    scheduler.stop();
    // Wake the scheduler so it observes the shutdown.
    let _ = watcher.sender().send(());
    watcher.stop();
    handle
        .join()
        .map_err(|_| anyhow!("Reconcile scheduler thread panicked"))?;
    drain_reports(&mut reports);

    Ok(())
}

fn drain_reports(reports: &mut Receiver<ReconcileReport>) {
    loop {
        match reports.try_recv() {
            Ok(report) => print_cycle(&report),
            Err(TryRecvError::Lagged(n)) => log::warn!("Skipped {} cycle reports", n),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn print_cycle(report: &ReconcileReport) {
    println!(
        "[{}] {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.summary()
    );
}
