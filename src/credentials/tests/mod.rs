//! Loader and configuration tests against store files on disk.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]


use std::{
    collections::HashSet,
    fs, io,
    path::Path,
    process::Command,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::time::timeout;

use super::{
    MemoryPasswordProvider, PasswordHandle, PasswordProvider, SslConfiguration,
    StoreConfiguration, StoreContext, StoreErrorKind, StoreLoader, StoreRole,
};
use crate::{
    events::{ChangeNotifier, EventType},
    settings::Settings,
    watch::{WatchService, WatchState},
};

const DEBOUNCE: Duration = Duration::from_millis(100);

fn write_store(dir: &Path, name: &str, bytes: &[u8]) -> String {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path.display().to_string()
}

fn provider(password: &str) -> Arc<dyn PasswordProvider> {
    Arc::new(MemoryPasswordProvider::new(PasswordHandle::from(password)))
}

fn load_kind(location: Option<&str>, password: &str, store_type: &str) -> StoreErrorKind {
    StoreLoader::new()
        .load(location, PasswordHandle::from(password), store_type)
        .unwrap_err()
        .cause
}

#[test]
fn loads_each_store_type_with_requested_type_name() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let p12 = write_store(dir.path(), "keystore.p12", &fixtures::pkcs12("changeit"));
    let pem = write_store(dir.path(), "bundle.pem", &fixtures::pem());
    let loader = StoreLoader::new();

    for (location, store_type) in [(&jks, "jks"), (&p12, "PKCS12"), (&p12, "p12"), (&pem, "PEM")] {
        let loaded = loader
            .load(Some(location.as_str()), PasswordHandle::from("changeit"), store_type)
            .unwrap();

        assert_eq!(loaded.store.store_type(), store_type);
        assert!(!loaded.store.is_empty());
        assert!(loaded.watch.is_none());
    }
}

#[test]
fn jks_store_exposes_entries_by_alias() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));

    let loaded = StoreLoader::new()
        .load(Some(jks.as_str()), PasswordHandle::from("changeit"), "JKS")
        .unwrap();

    assert_eq!(loaded.store.len(), 2);
    assert!(loaded.store.entry("SERVER").unwrap().is_key_entry());
    assert!(!loaded.store.entry("ca").unwrap().is_key_entry());
}

#[test]
fn file_uri_location_loads() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));

    let loaded = StoreLoader::new()
        .load(
            Some(format!("file://{jks}").as_str()),
            PasswordHandle::from("changeit"),
            "JKS",
        )
        .unwrap();

    assert_eq!(loaded.store.len(), 2);
}

#[test]
fn wrong_password_is_format_or_password_error() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let p12 = write_store(dir.path(), "keystore.p12", &fixtures::pkcs12("changeit"));

    assert!(matches!(
        load_kind(Some(jks.as_str()), "wrong", "JKS"),
        StoreErrorKind::FormatOrPassword { .. }
    ));
    assert!(matches!(
        load_kind(Some(p12.as_str()), "wrong", "PKCS12"),
        StoreErrorKind::FormatOrPassword { .. }
    ));
}

#[test]
fn garbage_file_is_format_or_password_error() {
    let dir = tempfile::tempdir().unwrap();
    let garbage = write_store(dir.path(), "keystore.jks", b"not a keystore");

    assert!(matches!(
        load_kind(Some(garbage.as_str()), "changeit", "JKS"),
        StoreErrorKind::FormatOrPassword { .. }
    ));
}

#[test]
fn missing_file_is_source_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.jks").display().to_string();

    let error = StoreLoader::new()
        .load(Some(missing.as_str()), PasswordHandle::from("changeit"), "JKS")
        .unwrap_err();

    assert!(matches!(error.cause, StoreErrorKind::SourceNotFound(_)));
    assert_eq!(error.location.as_deref(), Some(missing.as_str()));
}

#[test]
fn unsupported_scheme_is_io_error() {
    assert!(matches!(
        load_kind(Some("https://example.com/keystore.jks"), "changeit", "JKS"),
        StoreErrorKind::Io(_)
    ));
}

#[test]
fn missing_location_depends_on_store_type() {
    assert!(matches!(
        load_kind(None, "changeit", "JKS"),
        StoreErrorKind::InvalidConfig(_)
    ));
    assert!(matches!(
        load_kind(None, "changeit", "BKS"),
        StoreErrorKind::StoreEngine { .. }
    ));

    let loaded = StoreLoader::new()
        .load(None, PasswordHandle::empty(), "PEM")
        .unwrap();
    assert!(loaded.store.is_empty());
    assert_eq!(loaded.store.store_type(), "PEM");
    assert!(loaded.watch.is_none());
}

#[test]
fn password_is_erased_on_every_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let missing = dir.path().join("absent.jks").display().to_string();
    let loader = StoreLoader::new();

    let cases: [(Option<&str>, &str, &str, bool); 6] = [
        (Some(jks.as_str()), "changeit", "JKS", true),
        (Some(jks.as_str()), "wrong", "JKS", false),
        (Some(missing.as_str()), "changeit", "JKS", false),
        (None, "changeit", "JKS", false),
        (None, "changeit", "PEM", true),
        (Some(jks.as_str()), "changeit", "BKS", false),
    ];

    for (location, password, store_type, succeeds) in cases {
        let mut password = PasswordHandle::from(password);

        let result = loader.load_erasing(location, &mut password, store_type);

        assert_eq!(result.is_ok(), succeeds, "{location:?} as {store_type}");
        assert!(password.is_erased(), "{location:?} as {store_type}");
    }
}

#[test]
fn configuration_defaults_to_jks() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let context = StoreContext::without_watching(ChangeNotifier::new());

    let configuration =
        StoreConfiguration::new(StoreRole::KeyStore, Some(jks), provider("changeit"), None, &context)
            .unwrap();

    assert_eq!(configuration.store_type(), "JKS");
    assert_eq!(configuration.watch_state(), WatchState::Idle);
    assert!(configuration.watched_path().is_none());
}

#[test]
fn configurations_compare_by_role_location_type_and_provider() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let context = StoreContext::without_watching(ChangeNotifier::new());
    let shared = provider("changeit");
    let build = |role, provider: &Arc<dyn PasswordProvider>| {
        StoreConfiguration::new(
            role,
            Some(jks.clone()),
            Arc::clone(provider),
            Some("JKS".to_string()),
            &context,
        )
        .unwrap()
    };

    let first = build(StoreRole::KeyStore, &shared);
    let same = build(StoreRole::KeyStore, &shared);
    let other_provider = build(StoreRole::KeyStore, &provider("changeit"));
    let other_role = build(StoreRole::TrustStore, &shared);

    assert_eq!(first, same);
    assert_ne!(first, other_provider);
    assert_ne!(first, other_role);
}

#[test]
fn provider_failure_is_reported_with_location() {
    let context = StoreContext::without_watching(ChangeNotifier::new());
    let provider: Arc<dyn PasswordProvider> = Arc::new(
        super::EnvironmentPasswordProvider::new("STOREWATCH_TEST_UNSET_PASSWORD_VARIABLE"),
    );

    let error = StoreConfiguration::new(
        StoreRole::TrustStore,
        Some("/etc/ca.jks".to_string()),
        provider,
        None,
        &context,
    )
    .unwrap_err();

    assert!(matches!(error.cause, StoreErrorKind::InvalidConfig(_)));
    assert_eq!(error.location.as_deref(), Some("/etc/ca.jks"));
}

#[test]
fn missing_password_file_names_the_password_file() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let password_file = dir.path().join("keystore.pass");
    let context = StoreContext::without_watching(ChangeNotifier::new());

    let error = StoreConfiguration::new(
        StoreRole::KeyStore,
        Some(jks.clone()),
        Arc::new(super::FilePasswordProvider::new(&password_file)),
        None,
        &context,
    )
    .unwrap_err();

    assert!(matches!(error.cause, StoreErrorKind::InvalidConfig(_)));
    assert_eq!(error.location.as_deref(), Some(jks.as_str()));
    assert!(
        error
            .to_string()
            .contains(&password_file.display().to_string())
    );
}

#[test]
fn plain_path_and_file_uri_configurations_are_equal() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let context = StoreContext::without_watching(ChangeNotifier::new());
    let shared = provider("changeit");
    let build = |location: String| {
        StoreConfiguration::new(
            StoreRole::KeyStore,
            Some(location),
            Arc::clone(&shared),
            None,
            &context,
        )
        .unwrap()
    };

    let plain = build(jks.clone());
    let uri = build(format!("file://{jks}"));

    assert_eq!(plain, uri);

    let mut configurations = HashSet::new();
    configurations.insert(plain);
    configurations.insert(uri);
    assert_eq!(configurations.len(), 1);
}

#[test]
fn unequal_configurations_stay_distinct_in_sets() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let context = StoreContext::without_watching(ChangeNotifier::new());
    let shared = provider("changeit");
    let build = |role| {
        StoreConfiguration::new(role, Some(jks.clone()), Arc::clone(&shared), None, &context)
            .unwrap()
    };

    let configurations: HashSet<_> = [
        build(StoreRole::KeyStore),
        build(StoreRole::KeyStore),
        build(StoreRole::TrustStore),
    ]
    .into_iter()
    .collect();

    assert_eq!(configurations.len(), 2);
}

#[test]
fn blocked_source_read_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("keystore.jks");
    let status = Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(status.success());
    let location = fifo.display().to_string();
    let loader = StoreLoader::new().with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let error = loader
        .load(Some(location.as_str()), PasswordHandle::from("changeit"), "JKS")
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    match error.cause {
        StoreErrorKind::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
        other => panic!("expected a timed out read, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn loaded_store_watch_publishes_change() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let context = StoreContext::new(Arc::clone(&notifier), DEBOUNCE).unwrap();

    let configuration =
        StoreConfiguration::new(StoreRole::KeyStore, Some(jks.clone()), provider("changeit"), None, &context)
            .unwrap();
    assert_eq!(configuration.watch_state(), WatchState::Watching);

    fs::write(&jks, fixtures::jks("rotated")).unwrap();

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.source_path, Path::new(&jks).canonicalize().unwrap());

    configuration.stop_watching();
    assert_eq!(configuration.watch_state(), WatchState::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_load_starts_no_watch() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let service = WatchService::new(ChangeNotifier::new(), DEBOUNCE).unwrap();
    let loader = StoreLoader::new().with_watcher(service.clone());

    let result = loader.load(Some(jks.as_str()), PasswordHandle::from("wrong"), "JKS");

    assert!(result.is_err());
    assert_eq!(service.active_watches(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_configuration_releases_watch() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "keystore.jks", &fixtures::jks("changeit"));
    let service = WatchService::new(ChangeNotifier::new(), DEBOUNCE).unwrap();
    let loader = StoreLoader::new().with_watcher(service.clone());

    let loaded = loader
        .load(Some(jks.as_str()), PasswordHandle::from("changeit"), "JKS")
        .unwrap();
    assert_eq!(service.active_watches(), 1);

    drop(loaded);
    assert_eq!(service.active_watches(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stores_on_same_file_share_one_watch() {
    let dir = tempfile::tempdir().unwrap();
    let jks = write_store(dir.path(), "stores.jks", &fixtures::jks("changeit"));
    let settings = Settings::from_toml_str(&format!(
        r#"
[key_store]
location = "{jks}"
password = "changeit"

[trust_store]
location = "{jks}"
password = "changeit"

[watch]
debounce_ms = 100
"#
    ))
    .unwrap();
    let notifier = ChangeNotifier::new();
    let (_subscription, mut rx) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let context = StoreContext::from_settings(&settings, Arc::clone(&notifier)).unwrap();

    let ssl = SslConfiguration::from_settings(&settings, &context).unwrap();
    assert_eq!(ssl.stores().count(), 2);
    assert_eq!(ssl.watched_paths().len(), 1);

    fs::write(&jks, fixtures::jks("rotated")).unwrap();

    assert!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap().is_some());
    let extra = timeout(Duration::from_millis(800), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra event: {extra:?}");
}

#[test]
fn disabled_watching_loads_without_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let pem = write_store(dir.path(), "ca.pem", &fixtures::pem());
    let settings = Settings::from_toml_str(&format!(
        r#"
[trust_store]
location = "{pem}"
type = "PEM"

[watch]
enabled = false
"#
    ))
    .unwrap();

    let context = StoreContext::from_settings(&settings, ChangeNotifier::new()).unwrap();
    let ssl = SslConfiguration::from_settings(&settings, &context).unwrap();

    assert!(ssl.key_store.is_none());
    assert!(ssl.watched_paths().is_empty());
    assert_eq!(
        ssl.trust_store.unwrap().credential_store().store_type(),
        "PEM"
    );
}
