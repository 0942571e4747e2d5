use std::time::Duration;

use tracing::{debug, error, instrument};

use super::{
    CredentialStore, PasswordHandle, StoreConfigError, StoreErrorKind, StoreType,
    password::ErasureGuard,
    source::{self, ResolvedSource},
};
use crate::watch::{WatchHandle, WatchService};

/// Default upper bound for reading a credential source.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A freshly loaded store together with the watch on its source, if one
/// could be started.
#[derive(Debug)]
pub struct LoadedStore {
    /// The parsed store
    pub store: CredentialStore,
    /// Watch on the store's file; `None` for in-memory stores, when watching
    /// is disabled, or when the watch could not be started
    pub watch: Option<WatchHandle>,
}

/// Loads credential stores and starts watching their sources.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    watcher: Option<WatchService>,
    timeout: Duration,
}

impl Default for StoreLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreLoader {
    /// Creates a loader that does not watch sources.
    pub fn new() -> Self {
        Self {
            watcher: None,
            timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    /// Watches every successfully loaded file source with `watcher`.
    pub fn with_watcher(mut self, watcher: WatchService) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Bounds how long reading a source may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Loads a store of `store_type` from `location`.
    ///
    /// `None` as location yields an empty store, which only formats that can
    /// exist without a file allow. The password is consumed and erased
    /// before this returns, whatever the outcome.
    ///
    /// # Errors
    /// Returns the classified failure tagged with `location`.
    pub fn load(
        &self,
        location: Option<&str>,
        mut password: PasswordHandle,
        store_type: &str,
    ) -> Result<LoadedStore, StoreConfigError> {
        self.load_erasing(location, &mut password, store_type)
    }

    #[instrument(level = "debug", skip(self, password))]
    pub(crate) fn load_erasing(
        &self,
        location: Option<&str>,
        password: &mut PasswordHandle,
        store_type: &str,
    ) -> Result<LoadedStore, StoreConfigError> {
        debug!("Loading credential store");

        let guard = ErasureGuard::new(password);
        let result = self.read_store(location, guard.password(), store_type);
        drop(guard);

        match result {
            Ok((store, source)) => {
                let watch = source.and_then(|source| self.start_watch(&source));
                Ok(LoadedStore { store, watch })
            }
            Err(cause) => {
                log_failure(location, store_type, &cause);
                Err(StoreConfigError::new(location, cause))
            }
        }
    }

    fn read_store(
        &self,
        location: Option<&str>,
        password: &PasswordHandle,
        store_type: &str,
    ) -> Result<(CredentialStore, Option<ResolvedSource>), StoreErrorKind> {
        let engine: StoreType = store_type.parse()?;

        let Some(location) = location else {
            if engine.requires_location() {
                return Err(StoreErrorKind::InvalidConfig(
                    "location required for this store type".to_string(),
                ));
            }
            debug!("Created empty in-memory credential store");
            return Ok((CredentialStore::empty(store_type), None));
        };

        let source = source::resolve(location).map_err(StoreErrorKind::from_source_error)?;
        let bytes =
            source::read_all(&source, self.timeout).map_err(StoreErrorKind::from_source_error)?;
        let store = engine.load(&bytes, password, store_type)?;

        debug!(location, entries = store.len(), "Credential store loaded");
        Ok((store, Some(source)))
    }

    fn start_watch(&self, source: &ResolvedSource) -> Option<WatchHandle> {
        let watcher = self.watcher.as_ref()?;
        let path = source.watch_path()?;

        match watcher.watch(path) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(location = %path.display(), error = %e, "Unable to watch credential store for changes");
                None
            }
        }
    }
}

fn log_failure(location: Option<&str>, store_type: &str, cause: &StoreErrorKind) {
    let location = location.unwrap_or("<in-memory>");

    match cause {
        StoreErrorKind::FormatOrPassword { .. } => error!(
            location,
            error = %cause,
            "Something is wrong with the format of the store or the given password"
        ),
        StoreErrorKind::AlgorithmUnavailable { .. } => error!(
            location,
            error = %cause,
            "The algorithm used to check the integrity of the store cannot be found"
        ),
        StoreErrorKind::StoreEngine { .. } => error!(
            location,
            store_type,
            error = %cause,
            "No store engine could load this store type"
        ),
        StoreErrorKind::SourceNotFound(_) => error!(
            location,
            error = %cause,
            "The credential store file is not found"
        ),
        StoreErrorKind::Io(_) => error!(
            location,
            error = %cause,
            "I/O failure while reading the credential store"
        ),
        StoreErrorKind::InvalidConfig(_) => error!(
            location,
            store_type,
            error = %cause,
            "Invalid credential store configuration"
        ),
    }
}
