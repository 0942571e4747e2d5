use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while starting a file watch.
///
/// Failures after a watch is running are never returned to callers. They
/// move the watch to [`WatchState::Failed`](super::WatchState::Failed) and
/// are logged by the watch task.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The file to watch could not be resolved
    #[error("cannot resolve watched file '{path}': {source}")]
    Resolve {
        /// Path as given by the caller
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The file has no parent directory to observe
    #[error("watched file '{path}' has no parent directory")]
    NoParent {
        /// Canonical path of the file
        path: PathBuf,
    },

    /// The platform watcher could not be created or registered
    #[error("failed to initialize file watcher for '{path}': {source}")]
    Init {
        /// Directory that was being registered
        path: PathBuf,
        /// Underlying notify error
        #[source]
        source: notify::Error,
    },

    /// No tokio runtime was available to run watch tasks
    #[error("file watching requires a tokio runtime: {details}")]
    NoRuntime {
        /// Runtime lookup failure details
        details: String,
    },
}
