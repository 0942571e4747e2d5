//! Settings describing which stores to load and how to watch them.
//!
//! Settings are read from TOML:
//!
//! ```toml
//! [key_store]
//! location = "/etc/service/keystore.p12"
//! type = "PKCS12"
//! password_env = "KEYSTORE_PASSWORD"
//!
//! [trust_store]
//! location = "/etc/service/ca.pem"
//! type = "PEM"
//!
//! [loading]
//! timeout_ms = 10000
//!
//! [watch]
//! debounce_ms = 250
//! ```

mod error;
mod paths;

pub use error::SettingsError;
pub use paths::SettingsPaths;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use zeroize::Zeroize;

use crate::credentials::{
    EnvironmentPasswordProvider, FilePasswordProvider, MemoryPasswordProvider, PasswordHandle,
    PasswordProvider, StoreErrorKind,
};

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Store holding this side's identity
    #[serde(default)]
    pub key_store: Option<StoreSettings>,

    /// Store holding trusted certificates
    #[serde(default)]
    pub trust_store: Option<StoreSettings>,

    /// How stores are read
    #[serde(default)]
    pub loading: LoadingSettings,

    /// How store files are watched
    #[serde(default)]
    pub watch: WatchSettings,
}

impl Settings {
    /// Reads settings from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError::IoError {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        Self::parse(&content, &path.display().to_string())
    }

    /// Picks the settings file to read: `explicit` when given, otherwise
    /// `settings.toml` in the storewatch settings directory.
    ///
    /// # Errors
    /// Returns `SettingsError::NoSettingsDir` when no path is given and the
    /// settings directory cannot be determined.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, SettingsError> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => SettingsPaths::default_settings().map_err(|e| SettingsError::NoSettingsDir {
                details: e.to_string(),
            }),
        }
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    /// Returns error if the content is not valid settings TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Self::parse(content, "string")
    }

    fn parse(content: &str, location: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::TomlParseError {
            location: location.to_string(),
            details: e.to_string(),
        })
    }
}

/// One `[key_store]` or `[trust_store]` section.
///
/// At most one of `password`, `password_env` and `password_file` may be set.
/// With none set the store is opened with an empty password.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    /// Path or `file:` URI of the store; omit for an in-memory store
    pub location: Option<String>,

    /// Store type, `JKS` when omitted
    #[serde(rename = "type")]
    pub store_type: Option<String>,

    /// Inline password
    pub password: Option<String>,

    /// Environment variable holding the password
    pub password_env: Option<String>,

    /// File holding the password
    pub password_file: Option<PathBuf>,
}

impl StoreSettings {
    /// Builds the password provider this section describes.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if more than one password source is set.
    pub fn password_provider(&self) -> Result<Arc<dyn PasswordProvider>, StoreErrorKind> {
        let sources = [
            self.password.is_some(),
            self.password_env.is_some(),
            self.password_file.is_some(),
        ];
        if sources.iter().filter(|set| **set).count() > 1 {
            return Err(StoreErrorKind::InvalidConfig(
                "at most one of password, password_env and password_file may be set".to_string(),
            ));
        }

        let provider: Arc<dyn PasswordProvider> = if let Some(variable) = &self.password_env {
            Arc::new(EnvironmentPasswordProvider::new(variable.clone()))
        } else if let Some(path) = &self.password_file {
            Arc::new(FilePasswordProvider::new(path))
        } else {
            let password = self
                .password
                .as_deref()
                .map_or_else(PasswordHandle::empty, PasswordHandle::from);
            Arc::new(MemoryPasswordProvider::new(password))
        };

        Ok(provider)
    }
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("location", &self.location)
            .field("store_type", &self.store_type)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("password_env", &self.password_env)
            .field("password_file", &self.password_file)
            .finish()
    }
}

impl Drop for StoreSettings {
    fn drop(&mut self) {
        if let Some(password) = self.password.as_mut() {
            password.zeroize();
        }
    }
}

/// `[loading]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadingSettings {
    /// Upper bound for reading a store source, in milliseconds
    pub timeout_ms: u64,
}

impl LoadingSettings {
    /// The load timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LoadingSettings {
    fn default() -> Self {
        Self {
            timeout_ms: crate::credentials::DEFAULT_LOAD_TIMEOUT.as_millis() as u64,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSettings {
    /// Whether loaded store files are watched at all
    pub enabled: bool,
    /// Quiet period before a burst of file events is published, in
    /// milliseconds
    pub debounce_ms: u64,
}

impl WatchSettings {
    /// The debounce interval.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: crate::watch::DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}
