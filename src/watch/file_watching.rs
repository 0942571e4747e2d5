use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use notify::Event;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::{WatchState, file_watcher::FileWatcher, service::WatchRegistry};
use crate::events::{ChangeEvent, ChangeNotifier};

/// Everything a running watch task owns.
pub(crate) struct WatchTask {
    pub(crate) id: u64,
    pub(crate) watcher: FileWatcher,
    pub(crate) events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    pub(crate) stop: watch::Receiver<bool>,
    pub(crate) state: watch::Sender<WatchState>,
    pub(crate) notifier: Arc<ChangeNotifier>,
    pub(crate) registry: Weak<WatchRegistry>,
    pub(crate) debounce: Duration,
}

impl WatchTask {
    /// Runs until stopped or until the platform watcher fails.
    ///
    /// Matching events are collected until no new one has arrived for the
    /// debounce interval, then a single change event is published. A stop
    /// request discards any pending publish.
    pub(crate) async fn run(mut self) {
        let path = self.watcher.path().to_path_buf();
        let mut pending = false;

        let debounce_sleep = tokio::time::sleep(self.debounce);
        tokio::pin!(debounce_sleep);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.stop.wait_for(|stop| *stop) => {
                    debug!(path = %path.display(), "Stopping file watch");
                    break WatchState::Stopped;
                }

                event = self.events.recv() => match event {
                    Some(Ok(event)) => {
                        if self.watcher.is_relevant(&event) {
                            pending = true;
                            debounce_sleep
                                .as_mut()
                                .reset(tokio::time::Instant::now() + self.debounce);
                        }
                    }
                    Some(Err(e)) => {
                        error!(path = %path.display(), error = %e, "Error watching credential store file");
                        break WatchState::Failed;
                    }
                    None => {
                        error!(path = %path.display(), "File watcher event channel closed");
                        break WatchState::Failed;
                    }
                },

                _ = &mut debounce_sleep, if pending => {
                    pending = false;
                    info!(path = %path.display(), "Change detected in credential store file");
                    self.notifier.publish(&ChangeEvent::configuration_changed(path.clone()));
                }
            }
        };

        drop(self.watcher);
        self.state.send_replace(outcome);

        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&path, self.id);
        }
    }
}
