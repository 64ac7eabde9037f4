//! File system watcher that turns workspace changes into cycle triggers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::broadcast;

use crate::error::{ReconcileError, Result};
use crate::workspace::scanner::ScanRules;

/// Default quiet period before a burst of events becomes one trigger.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a workspace root and sends a unit trigger per debounced batch.
pub struct WorkspaceWatcher {
    root: PathBuf,
    rules: ScanRules,
    debounce: Duration,
    sender: broadcast::Sender<()>,
    shutdown: Arc<AtomicBool>,
}

impl WorkspaceWatcher {
    pub fn new(root: impl Into<PathBuf>, rules: ScanRules) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            root: root.into(),
            rules,
            debounce: DEFAULT_DEBOUNCE,
            sender,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Triggers are sent on this channel.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<()> {
        self.sender.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sends a trigger without a file event.
    pub fn trigger(&self) {
        if self.sender.send(()).is_err() {
            log::debug!("No trigger listeners active");
        }
    }

    /// Watches the root until [`stop`](Self::stop) is called.
    pub fn watch(&self) -> Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer(self.debounce, tx)
            .map_err(|e| ReconcileError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| ReconcileError::WatchError(e.to_string()))?;

        log::info!("Started watching workspace: {}", self.root.display());

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    if self.is_relevant_batch(&events) {
                        log::debug!("{} file events, triggering reconcile", events.len());
                        self.trigger();
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Watch error: {}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }

        log::info!("Stopped watching workspace");
        Ok(())
    }

    /// Returns true if any event names a path the scanner would not exclude.
    fn is_relevant_batch(&self, events: &[DebouncedEvent]) -> bool {
        events.iter().any(|e| self.is_relevant(&e.path))
    }

    fn is_relevant(&self, path: &Path) -> bool {
        !self.rules.is_excluded(&self.root, path)
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Runs a [`WorkspaceWatcher`] on a background thread.
pub struct AsyncWorkspaceWatcher {
    watcher: Arc<WorkspaceWatcher>,
    watch_handle: Option<std::thread::JoinHandle<Result<()>>>,
}

impl AsyncWorkspaceWatcher {
    pub fn new(watcher: WorkspaceWatcher) -> Self {
        Self {
            watcher: Arc::new(watcher),
            watch_handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.watch_handle.is_some() {
            return;
        }

        let watcher = Arc::clone(&self.watcher);
        self.watch_handle = Some(std::thread::spawn(move || {
            let result = watcher.watch();
            if let Err(e) = &result {
                log::error!("Workspace watcher failed: {}", e);
            }
            result
        }));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.watcher.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<()> {
        self.watcher.sender()
    }

    pub fn stop(&mut self) {
        self.watcher.stop();
        if let Some(handle) = self.watch_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AsyncWorkspaceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn event(path: PathBuf) -> DebouncedEvent {
        DebouncedEvent {
            path,
            kind: notify_debouncer_mini::DebouncedEventKind::Any,
        }
    }

    #[test]
    fn test_excluded_paths_do_not_trigger() {
        let dir = TempDir::new().unwrap();
        let watcher = WorkspaceWatcher::new(dir.path(), ScanRules::default());

        assert!(!watcher.is_relevant_batch(&[
            event(dir.path().join("main.xml")),
            event(dir.path().join("appschemas/roads.xsd")),
            event(dir.path().join("datasources/feature/bbox_cache.properties")),
        ]));
        assert!(watcher.is_relevant_batch(&[
            event(dir.path().join("main.xml")),
            event(dir.path().join("jdbc/conn1.xml")),
        ]));
        // Deleted files still count.
        assert!(watcher.is_relevant(&dir.path().join("jdbc/gone.xml")));
    }

    #[test]
    fn test_manual_trigger() {
        let dir = TempDir::new().unwrap();
        let watcher = WorkspaceWatcher::new(dir.path(), ScanRules::default());
        let mut rx = watcher.subscribe();

        watcher.trigger();

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_watcher_stop() {
        let dir = TempDir::new().unwrap();
        let watcher = WorkspaceWatcher::new(dir.path(), ScanRules::default());

        assert!(!watcher.is_stopped());
        watcher.stop();
        assert!(watcher.is_stopped());
    }

    #[test]
    fn test_async_watcher_triggers_on_file_change() {
        let dir = TempDir::new().unwrap();
        let mut watcher = AsyncWorkspaceWatcher::new(
            WorkspaceWatcher::new(dir.path(), ScanRules::default())
                .with_debounce(Duration::from_millis(50)),
        );
        let mut rx = watcher.subscribe();
        watcher.start();

        // Give the backend time to register the watch.
        std::thread::sleep(Duration::from_millis(200));
        fs::create_dir_all(dir.path().join("jdbc")).unwrap();
        fs::write(dir.path().join("jdbc/conn1.xml"), "<JDBC/>").unwrap();

        let mut triggered = false;
        for _ in 0..50 {
            if rx.try_recv().is_ok() {
                triggered = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        watcher.stop();
        assert!(triggered, "no trigger within 5s");
    }
}
