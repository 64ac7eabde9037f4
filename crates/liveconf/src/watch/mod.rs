//! Cycle triggers: file system events and periodic ticks.

pub mod scheduler;
pub mod watcher;

pub use scheduler::ReconcileScheduler;
pub use watcher::{AsyncWorkspaceWatcher, WorkspaceWatcher, DEFAULT_DEBOUNCE};
