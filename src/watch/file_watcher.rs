use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

use super::WatchError;

/// Watches one file by observing its parent directory.
///
/// Directory watches survive editors and tools that replace the file by
/// renaming a new one into place, which a watch on the file itself would not.
/// Raw notify results are forwarded into an unbounded channel; file events
/// are infrequent but bursty.
pub(crate) struct FileWatcher {
    _watcher: RecommendedWatcher,
    file_name: OsString,
    path: PathBuf,
}

impl FileWatcher {
    /// Starts observing the parent directory of `path`, which must already be
    /// canonical.
    ///
    /// # Errors
    /// Returns error if `path` has no parent or the platform watcher cannot
    /// be created or registered.
    pub(crate) fn new(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<notify::Result<Event>>), WatchError> {
        let (Some(directory), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(WatchError::NoParent {
                path: path.to_path_buf(),
            });
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(|source| WatchError::Init {
            path: directory.to_path_buf(),
            source,
        })?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Init {
                path: directory.to_path_buf(),
                source,
            })?;

        Ok((
            Self {
                _watcher: watcher,
                file_name: file_name.to_os_string(),
                path: path.to_path_buf(),
            },
            event_rx,
        ))
    }

    /// The canonical path being watched.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `event` modifies the watched file.
    ///
    /// Creation counts as modification so that atomic replace-by-rename is
    /// noticed. Events for sibling files are ignored.
    pub(crate) fn is_relevant(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
            && event
                .paths
                .iter()
                .any(|path| path.file_name() == Some(self.file_name.as_os_str()))
    }
}
