use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tracing::{error, info};

use super::{
    CredentialStore, PasswordProvider, StoreConfigError, StoreLoader,
    engine::DEFAULT_STORE_TYPE,
    source::{self, ResolvedSource},
};
use crate::{
    events::ChangeNotifier,
    settings::{Settings, StoreSettings},
    watch::{WatchError, WatchHandle, WatchService, WatchState},
};

/// What a store is used for in a TLS setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreRole {
    /// Holds this side's private key and certificate chain
    KeyStore,
    /// Holds the certificates used to verify the peer
    TrustStore,
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRole::KeyStore => f.write_str("key store"),
            StoreRole::TrustStore => f.write_str("trust store"),
        }
    }
}

/// Shared services every store configuration needs.
///
/// Built once by process bootstrap. Configurations only borrow it, so they
/// all publish on the same notifier and share watches on the same files.
#[derive(Debug, Clone)]
pub struct StoreContext {
    notifier: Arc<ChangeNotifier>,
    loader: StoreLoader,
}

impl StoreContext {
    /// Creates a context that watches loaded stores on the current tokio
    /// runtime.
    ///
    /// # Errors
    /// Returns error when called outside a tokio runtime.
    pub fn new(notifier: Arc<ChangeNotifier>, debounce: Duration) -> Result<Self, WatchError> {
        let watcher = WatchService::new(Arc::clone(&notifier), debounce)?;

        Ok(Self {
            notifier,
            loader: StoreLoader::new().with_watcher(watcher),
        })
    }

    /// Creates a context that loads stores without watching them.
    pub fn without_watching(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            notifier,
            loader: StoreLoader::new(),
        }
    }

    /// Creates a context from the `loading` and `watch` sections of
    /// `settings`.
    ///
    /// # Errors
    /// Returns error when watching is enabled outside a tokio runtime.
    pub fn from_settings(
        settings: &Settings,
        notifier: Arc<ChangeNotifier>,
    ) -> Result<Self, WatchError> {
        let context = if settings.watch.enabled {
            Self::new(notifier, settings.watch.debounce())?
        } else {
            Self::without_watching(notifier)
        };

        Ok(context.with_load_timeout(settings.loading.timeout()))
    }

    /// Bounds how long reading a store source may take.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.loader = self.loader.with_timeout(timeout);
        self
    }

    /// The shared notifier.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// The loader used by configurations built with this context.
    pub fn loader(&self) -> &StoreLoader {
        &self.loader
    }
}

/// One loaded key store or trust store and the watch on its file.
///
/// The store never changes after construction. When the file changes on
/// disk a `ConfigurationChanged` event is published, and whoever owns this
/// configuration builds a new one. Dropping the configuration releases its
/// watch.
pub struct StoreConfiguration {
    role: StoreRole,
    location: Option<String>,
    resolved: Option<ResolvedSource>,
    store_type: String,
    password_provider: Arc<dyn PasswordProvider>,
    store: CredentialStore,
    watch: Option<WatchHandle>,
}

impl StoreConfiguration {
    /// Loads the store described by the arguments.
    ///
    /// `store_type` defaults to `JKS`.
    ///
    /// # Errors
    /// Returns error if the password cannot be obtained or the store cannot
    /// be loaded.
    pub fn new(
        role: StoreRole,
        location: Option<String>,
        password_provider: Arc<dyn PasswordProvider>,
        store_type: Option<String>,
        context: &StoreContext,
    ) -> Result<Self, StoreConfigError> {
        let store_type = store_type.unwrap_or_else(|| DEFAULT_STORE_TYPE.to_string());

        let password = password_provider.password().map_err(|cause| {
            error!(%role, location = location.as_deref(), error = %cause, "Unable to obtain store password");
            StoreConfigError::new(location.as_deref(), cause)
        })?;

        let loaded = context
            .loader()
            .load(location.as_deref(), password, &store_type)?;

        info!(
            %role,
            location = location.as_deref().unwrap_or("<in-memory>"),
            store_type = %store_type,
            entries = loaded.store.len(),
            watched = loaded.watch.is_some(),
            "Credential store configured"
        );

        let resolved = location
            .as_deref()
            .and_then(|location| source::resolve(location).ok());

        Ok(Self {
            role,
            location,
            resolved,
            store_type,
            password_provider,
            store: loaded.store,
            watch: loaded.watch,
        })
    }

    /// Builds a configuration from a settings section.
    ///
    /// # Errors
    /// Returns error if the section names conflicting password sources or the
    /// store cannot be loaded.
    pub fn from_settings(
        role: StoreRole,
        settings: &StoreSettings,
        context: &StoreContext,
    ) -> Result<Self, StoreConfigError> {
        let provider = settings
            .password_provider()
            .map_err(|cause| StoreConfigError::new(settings.location.as_deref(), cause))?;

        Self::new(
            role,
            settings.location.clone(),
            provider,
            settings.store_type.clone(),
            context,
        )
    }

    /// The loaded store.
    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    /// The store type the configuration was built with.
    pub fn store_type(&self) -> &str {
        &self.store_type
    }

    /// The configured location, `None` for in-memory stores.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// What the store is used for.
    pub fn role(&self) -> StoreRole {
        self.role
    }

    /// The provider passwords are obtained from.
    pub fn password_provider(&self) -> &Arc<dyn PasswordProvider> {
        &self.password_provider
    }

    /// Canonical path of the watched file, if the store is watched.
    pub fn watched_path(&self) -> Option<&Path> {
        self.watch.as_ref().map(WatchHandle::path)
    }

    /// State of the watch on the store's file; `Idle` if there is none.
    pub fn watch_state(&self) -> WatchState {
        self.watch
            .as_ref()
            .map_or(WatchState::Idle, WatchHandle::state)
    }

    /// Stops watching the store's file. Idempotent.
    pub fn stop_watching(&self) {
        if let Some(watch) = &self.watch {
            watch.stop();
        }
    }
}

impl StoreConfiguration {
    fn provider_address(&self) -> *const () {
        Arc::as_ptr(&self.password_provider).cast::<()>()
    }
}

/// Configurations are equal when they play the same role for the same
/// resolved source, with the same store type and the same provider instance.
/// `/etc/ks.jks` and `file:///etc/ks.jks` are the same source.
impl PartialEq for StoreConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role
            && self.resolved == other.resolved
            && self.store_type == other.store_type
            && self.provider_address() == other.provider_address()
    }
}

impl Eq for StoreConfiguration {}

impl Hash for StoreConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.role.hash(state);
        self.resolved.hash(state);
        self.store_type.hash(state);
        self.provider_address().hash(state);
    }
}

impl fmt::Debug for StoreConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfiguration")
            .field("role", &self.role)
            .field("location", &self.location)
            .field("store_type", &self.store_type)
            .field("password_provider", &self.password_provider)
            .field("entries", &self.store.len())
            .field("watch", &self.watch)
            .finish()
    }
}

/// The key store and trust store used by one TLS endpoint.
#[derive(Debug, Default)]
pub struct SslConfiguration {
    /// Store holding this side's identity
    pub key_store: Option<StoreConfiguration>,
    /// Store holding trusted certificates
    pub trust_store: Option<StoreConfiguration>,
}

impl SslConfiguration {
    /// Loads both stores described in `settings`.
    ///
    /// When both point at the same file they share a single watch, so a
    /// change produces one event.
    ///
    /// # Errors
    /// Returns the first store that fails to load.
    pub fn from_settings(
        settings: &Settings,
        context: &StoreContext,
    ) -> Result<Self, StoreConfigError> {
        let key_store = settings
            .key_store
            .as_ref()
            .map(|section| {
                StoreConfiguration::from_settings(StoreRole::KeyStore, section, context)
            })
            .transpose()?;
        let trust_store = settings
            .trust_store
            .as_ref()
            .map(|section| {
                StoreConfiguration::from_settings(StoreRole::TrustStore, section, context)
            })
            .transpose()?;

        Ok(Self {
            key_store,
            trust_store,
        })
    }

    /// Configured stores, key store first.
    pub fn stores(&self) -> impl Iterator<Item = &StoreConfiguration> {
        self.key_store.iter().chain(self.trust_store.iter())
    }

    /// Distinct files watched by either store.
    pub fn watched_paths(&self) -> BTreeSet<PathBuf> {
        self.stores()
            .filter_map(StoreConfiguration::watched_path)
            .map(Path::to_path_buf)
            .collect()
    }
}
