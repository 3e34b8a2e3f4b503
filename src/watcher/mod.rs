//! Safety governor

pub mod run_watcher;

pub use run_watcher::{GuardTrip, RunWatcher, StopReason, WatcherState};
