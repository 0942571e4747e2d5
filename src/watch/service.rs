use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};
use tracing::{debug, info};

use super::{WatchError, WatchState, file_watcher::FileWatcher, file_watching::WatchTask};
use crate::events::ChangeNotifier;

/// Default quiet period before a burst of file events is published.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct WatchEntry {
    id: u64,
    refs: usize,
    stop: watch::Sender<bool>,
    state: watch::Receiver<WatchState>,
}

pub(crate) struct WatchRegistry {
    entries: Mutex<HashMap<PathBuf, WatchEntry>>,
    next_id: AtomicU64,
    notifier: Arc<ChangeNotifier>,
    runtime: Handle,
    debounce: Duration,
}

impl WatchRegistry {
    /// Drops one reference to the watch `id` on `path`, stopping the task
    /// when it was the last one.
    fn release(&self, path: &Path, id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(entry) = entries.get_mut(path).filter(|entry| entry.id == id) else {
            return;
        };

        entry.refs -= 1;
        if entry.refs == 0 {
            if let Some(entry) = entries.remove(path) {
                entry.stop.send_replace(true);
                debug!(path = %path.display(), "Last reference released, stopping watch");
            }
        }
    }

    /// Removes the entry for a task that ended on its own.
    pub(crate) fn forget(&self, path: &Path, id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if entries.get(path).is_some_and(|entry| entry.id == id) {
            entries.remove(path);
        }
    }
}

/// Starts and shares file watches that publish change events.
///
/// Watches are keyed by canonical path and reference counted: every caller
/// gets its own [`WatchHandle`], but all handles on the same file share one
/// background task, so one change on disk produces one event no matter how
/// many configurations point at the file. The task stops when the last
/// handle is stopped or dropped.
#[derive(Clone)]
pub struct WatchService {
    registry: Arc<WatchRegistry>,
}

impl WatchService {
    /// Creates a service that runs its tasks on the current tokio runtime.
    ///
    /// # Errors
    /// Returns `WatchError::NoRuntime` when called outside a tokio runtime.
    pub fn new(notifier: Arc<ChangeNotifier>, debounce: Duration) -> Result<Self, WatchError> {
        let runtime = Handle::try_current().map_err(|e| WatchError::NoRuntime {
            details: e.to_string(),
        })?;

        Ok(Self::with_runtime(notifier, debounce, runtime))
    }

    /// Creates a service that runs its tasks on the given runtime.
    pub fn with_runtime(notifier: Arc<ChangeNotifier>, debounce: Duration, runtime: Handle) -> Self {
        Self {
            registry: Arc::new(WatchRegistry {
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                notifier,
                runtime,
                debounce,
            }),
        }
    }

    /// Starts watching `path`, or joins the existing watch on it.
    ///
    /// # Errors
    /// Returns error if the path cannot be canonicalized or the platform
    /// watcher cannot observe its parent directory.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<WatchHandle, WatchError> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|source| WatchError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(&canonical) {
            if !entry.state.borrow().is_terminal() {
                entry.refs += 1;
                debug!(path = %canonical.display(), refs = entry.refs, "Joined existing watch");
                return Ok(self.handle(canonical, entry.id, entry.state.clone()));
            }
        }

        let (watcher, events) = FileWatcher::new(&canonical)?;

        Ok(self.start(&mut entries, canonical, watcher, events))
    }

    /// Starts watching `path` with events fed from the returned sender
    /// instead of the platform watcher.
    #[cfg(test)]
    pub(crate) fn watch_with_events(
        &self,
        path: &Path,
    ) -> Result<(WatchHandle, mpsc::UnboundedSender<notify::Result<notify::Event>>), WatchError>
    {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut entries = self
            .registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (watcher, _platform_events) = FileWatcher::new(&canonical)?;
        let (events_tx, events) = mpsc::unbounded_channel();

        Ok((self.start(&mut entries, canonical, watcher, events), events_tx))
    }

    /// Registers a new watch entry for `canonical` and spawns its task.
    fn start(
        &self,
        entries: &mut HashMap<PathBuf, WatchEntry>,
        canonical: PathBuf,
        watcher: FileWatcher,
        events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    ) -> WatchHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(WatchState::Watching);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        entries.insert(
            canonical.clone(),
            WatchEntry {
                id,
                refs: 1,
                stop: stop_tx,
                state: state_rx.clone(),
            },
        );

        let task = WatchTask {
            id,
            watcher,
            events,
            stop: stop_rx,
            state: state_tx,
            notifier: Arc::clone(&self.registry.notifier),
            registry: Arc::downgrade(&self.registry),
            debounce: self.registry.debounce,
        };
        self.registry.runtime.spawn(task.run());

        info!(path = %canonical.display(), "Watching credential store file for changes");

        self.handle(canonical, id, state_rx)
    }

    /// Number of distinct files currently watched.
    pub fn active_watches(&self) -> usize {
        self.registry
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The debounce interval applied to file events.
    pub fn debounce(&self) -> Duration {
        self.registry.debounce
    }

    fn handle(&self, path: PathBuf, id: u64, state: watch::Receiver<WatchState>) -> WatchHandle {
        WatchHandle {
            registry: Arc::clone(&self.registry),
            path,
            id,
            state,
            released: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for WatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchService")
            .field("active_watches", &self.active_watches())
            .field("debounce", &self.registry.debounce)
            .finish()
    }
}

/// One caller's interest in a file watch.
///
/// Used only to request cancellation; stopping never waits for the task.
/// Dropping the handle stops it.
pub struct WatchHandle {
    registry: Arc<WatchRegistry>,
    path: PathBuf,
    id: u64,
    state: watch::Receiver<WatchState>,
    released: AtomicBool,
}

impl WatchHandle {
    /// Canonical path of the watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state as seen by this handle.
    ///
    /// A stopped handle reports `Stopped` even while other handles keep the
    /// shared watch alive.
    pub fn state(&self) -> WatchState {
        if self.released.load(Ordering::Acquire) {
            return WatchState::Stopped;
        }
        *self.state.borrow()
    }

    /// Receiver for state transitions of the shared watch task.
    pub fn state_changes(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    /// Releases this handle's interest in the watch.
    ///
    /// Idempotent: only the first call has an effect.
    pub fn stop(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.release(&self.path, self.id);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}
