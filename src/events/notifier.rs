use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        Arc, PoisonError, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc;
use tracing::{error, trace};

use super::{ChangeEvent, EventType};

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Registration {
    id: u64,
    event_type: EventType,
    source: Option<PathBuf>,
    listener: Listener,
}

impl Registration {
    fn accepts(&self, event: &ChangeEvent) -> bool {
        self.event_type == event.event_type
            && self
                .source
                .as_ref()
                .is_none_or(|source| *source == event.source_path)
    }
}

/// Publish/subscribe registry for change events.
///
/// One notifier is created by the process bootstrap and shared by reference
/// with every configuration and watcher. Delivery is synchronous, in
/// registration order, to a snapshot of the listeners registered when
/// `publish` starts. The registry lock is held only while mutating or taking
/// that snapshot.
#[derive(Default)]
pub struct ChangeNotifier {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

/// A listener registration that is removed when dropped.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    notifier: Weak<ChangeNotifier>,
}

impl ChangeNotifier {
    /// Creates a shared notifier with no listeners.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a listener for every event of `event_type`.
    pub fn subscribe<F>(self: &Arc<Self>, event_type: EventType, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.register(event_type, None, Arc::new(listener))
    }

    /// Registers a listener for events of `event_type` raised by one file.
    ///
    /// The path is canonicalized when possible so that it compares equal to
    /// the canonical paths carried by watcher events.
    pub fn subscribe_source<F>(
        self: &Arc<Self>,
        event_type: EventType,
        source: impl AsRef<Path>,
        listener: F,
    ) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let source = source.as_ref();
        let source = source
            .canonicalize()
            .unwrap_or_else(|_| source.to_path_buf());

        self.register(event_type, Some(source), Arc::new(listener))
    }

    /// Forwards matching events into an unbounded channel.
    ///
    /// Convenient for async consumers that would rather `recv().await` than
    /// run inside the publisher's call stack.
    pub fn subscribe_channel(
        self: &Arc<Self>,
        event_type: EventType,
        source: Option<&Path>,
    ) -> (Subscription, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let forward = move |event: &ChangeEvent| {
            let _ = tx.send(event.clone());
        };

        let subscription = match source {
            Some(path) => self.subscribe_source(event_type, path, forward),
            None => self.subscribe(event_type, forward),
        };

        (subscription, rx)
    }

    /// Delivers `event` to every matching listener and returns how many
    /// listeners completed without panicking.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still receive the event.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<Listener> = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|registration| registration.accepts(event))
            .map(|registration| Arc::clone(&registration.listener))
            .collect();

        trace!(
            event_type = %event.event_type,
            source = %event.source_path.display(),
            listeners = snapshot.len(),
            "Publishing change event"
        );

        let mut delivered = 0;
        for listener in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    event_type = %event.event_type,
                    source = %event.source_path.display(),
                    "Change listener panicked"
                ),
            }
        }

        delivered
    }

    /// Number of registered listeners across all event types.
    pub fn listener_count(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn register(
        self: &Arc<Self>,
        event_type: EventType,
        source: Option<PathBuf>,
        listener: Listener,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                event_type,
                source,
                listener,
            });

        Subscription {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registration| registration.id != id);
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.id);
        }
    }
}
