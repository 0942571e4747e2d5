//! File watching for credential store sources.
//!
//! A watch observes the parent directory of a store file, filters events to
//! that file's name, debounces bursts, and publishes a
//! [`ConfigurationChanged`](crate::events::EventType::ConfigurationChanged)
//! event through the shared notifier.

mod error;
mod file_watcher;
mod file_watching;
mod service;

#[cfg(test)]
mod tests;

pub use error::WatchError;
pub use service::{DEFAULT_DEBOUNCE, WatchHandle, WatchService};

/// Lifecycle of a file watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No watch has been started
    Idle,
    /// The task is observing the file
    Watching,
    /// The watch was stopped on request
    Stopped,
    /// The platform watcher failed and the task ended
    Failed,
}

impl WatchState {
    /// Whether the watch task has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, WatchState::Stopped | WatchState::Failed)
    }
}
