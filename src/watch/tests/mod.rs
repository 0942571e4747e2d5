//! Watch lifecycle tests against the real filesystem.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{fs, path::Path, sync::Arc, time::Duration};

use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

use super::{WatchError, WatchService, WatchState};
use crate::events::{ChangeEvent, ChangeNotifier, EventType};

const DEBOUNCE: Duration = Duration::from_millis(100);
const EVENT_WAIT: Duration = Duration::from_secs(5);
const QUIET_WAIT: Duration = Duration::from_millis(800);

fn service(notifier: &Arc<ChangeNotifier>) -> WatchService {
    WatchService::new(Arc::clone(notifier), DEBOUNCE).unwrap()
}

fn touch(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

async fn next_event(rx: &mut UnboundedReceiver<ChangeEvent>) -> Option<ChangeEvent> {
    timeout(EVENT_WAIT, rx.recv()).await.ok().flatten()
}

async fn assert_quiet(rx: &mut UnboundedReceiver<ChangeEvent>) {
    let extra = timeout(QUIET_WAIT, rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra event: {extra:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn modifying_watched_file_publishes_exactly_one_event() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.jks");
    touch(&store, "v1");

    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) = notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let watches = service(&notifier);
    let handle = watches.watch(&store).unwrap();
    assert_eq!(handle.state(), WatchState::Watching);

    touch(&store, "v2");
    touch(&store, "v2 with more bytes");

    let event = next_event(&mut rx).await.expect("no change event published");
    assert_eq!(event.event_type, EventType::ConfigurationChanged);
    assert_eq!(event.source_path, store.canonicalize().unwrap());
    assert_quiet(&mut rx).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unrelated_file_in_same_directory_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.jks");
    let neighbour = dir.path().join("notes.txt");
    touch(&store, "v1");
    touch(&neighbour, "v1");

    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) = notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let watches = service(&notifier);
    let _handle = watches.watch(&store).unwrap();

    touch(&neighbour, "v2");

    assert_quiet(&mut rx).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn distinct_files_have_independent_streams() {
    let dir = tempfile::tempdir().unwrap();
    let key_store = dir.path().join("keystore.jks");
    let trust_store = dir.path().join("truststore.jks");
    touch(&key_store, "k1");
    touch(&trust_store, "t1");

    let notifier = ChangeNotifier::new();
    let (_sub_a, mut rx_a) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, Some(key_store.as_path()));
    let (_sub_b, mut rx_b) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, Some(trust_store.as_path()));
    let watches = service(&notifier);
    let _a = watches.watch(&key_store).unwrap();
    let _b = watches.watch(&trust_store).unwrap();
    assert_eq!(watches.active_watches(), 2);

    touch(&key_store, "k2");

    let event = next_event(&mut rx_a).await.expect("no event for key store");
    assert_eq!(event.source_path, key_store.canonicalize().unwrap());
    assert_quiet(&mut rx_b).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn handles_on_same_file_share_one_watch() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("shared.p12");
    touch(&store, "v1");

    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) = notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let watches = service(&notifier);
    let first = watches.watch(&store).unwrap();
    let second = watches.watch(dir.path().join(".").join("shared.p12")).unwrap();
    assert_eq!(watches.active_watches(), 1);
    assert_eq!(first.path(), second.path());

    touch(&store, "v2");

    assert!(next_event(&mut rx).await.is_some());
    assert_quiet(&mut rx).await;

    first.stop();
    assert_eq!(watches.active_watches(), 1);
    assert_eq!(second.state(), WatchState::Watching);

    touch(&store, "v3");
    assert!(next_event(&mut rx).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_twice_is_the_same_as_stopping_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.jks");
    touch(&store, "v1");

    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) = notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let watches = service(&notifier);
    let handle = watches.watch(&store).unwrap();
    let mut states = handle.state_changes();

    handle.stop();
    handle.stop();

    assert_eq!(handle.state(), WatchState::Stopped);
    assert_eq!(watches.active_watches(), 0);
    let ended = timeout(EVENT_WAIT, states.wait_for(|state| state.is_terminal()))
        .await
        .expect("watch task did not end")
        .map(|state| *state);
    assert_eq!(ended.ok(), Some(WatchState::Stopped));

    touch(&store, "v2");
    assert_quiet(&mut rx).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_last_handle_stops_the_task() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.jks");
    touch(&store, "v1");

    let notifier = ChangeNotifier::new();
    let watches = service(&notifier);
    let handle = watches.watch(&store).unwrap();
    let mut states = handle.state_changes();

    drop(handle);

    assert_eq!(watches.active_watches(), 0);
    assert!(
        timeout(EVENT_WAIT, states.wait_for(|state| state.is_terminal()))
            .await
            .is_ok()
    );

    let restarted = watches.watch(&store).unwrap();
    assert_eq!(restarted.state(), WatchState::Watching);
}

async fn wait_for_active(watches: &WatchService, expected: usize) {
    timeout(EVENT_WAIT, async {
        while watches.active_watches() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("active watch count never settled");
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_error_fails_only_that_watch() {
    let dir = tempfile::tempdir().unwrap();
    let failing = dir.path().join("keystore.jks");
    let healthy = dir.path().join("truststore.jks");
    touch(&failing, "k1");
    touch(&healthy, "t1");

    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, Some(healthy.as_path()));
    let watches = service(&notifier);
    let (broken, events) = watches.watch_with_events(&failing).unwrap();
    let other = watches.watch(&healthy).unwrap();
    let mut states = broken.state_changes();

    events
        .send(Err(notify::Error::generic("watch descriptor lost")))
        .unwrap();

    timeout(EVENT_WAIT, states.wait_for(|state| *state == WatchState::Failed))
        .await
        .expect("watch did not fail")
        .unwrap();
    assert_eq!(broken.state(), WatchState::Failed);
    wait_for_active(&watches, 1).await;

    assert_eq!(other.state(), WatchState::Watching);
    touch(&healthy, "t2");
    let event = next_event(&mut rx).await.expect("healthy watch stopped publishing");
    assert_eq!(event.source_path, healthy.canonicalize().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_event_channel_fails_the_watch() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.jks");
    touch(&store, "v1");

    let notifier = ChangeNotifier::new();
    let watches = service(&notifier);
    let (handle, events) = watches.watch_with_events(&store).unwrap();
    let mut states = handle.state_changes();

    drop(events);

    timeout(EVENT_WAIT, states.wait_for(|state| state.is_terminal()))
        .await
        .expect("watch did not end")
        .unwrap();
    assert_eq!(handle.state(), WatchState::Failed);
    wait_for_active(&watches, 0).await;

    let restarted = watches.watch(&store).unwrap();
    assert_eq!(restarted.state(), WatchState::Watching);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_cannot_be_watched() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = ChangeNotifier::new();

    let result = service(&notifier).watch(dir.path().join("missing.jks"));

    assert!(matches!(result, Err(WatchError::Resolve { .. })));
}

#[test]
fn service_requires_a_runtime() {
    let result = WatchService::new(ChangeNotifier::new(), DEBOUNCE);

    assert!(matches!(result, Err(WatchError::NoRuntime { .. })));
}
