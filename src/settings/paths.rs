use std::{
    env,
    io::{Error, ErrorKind},
    path::PathBuf,
};

/// Locations of storewatch's settings and log files
///
/// Follows the XDG Base Directory specification for settings.
pub struct SettingsPaths;

impl SettingsPaths {
    /// Returns the settings directory
    ///
    /// - First checks `XDG_CONFIG_HOME`
    /// - Falls back to `$HOME/.config`
    /// - Appends "storewatch" to the base directory
    ///
    /// # Errors
    /// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set
    pub fn config_dir() -> Result<PathBuf, Error> {
        Self::config_dir_from(env::var("XDG_CONFIG_HOME").ok(), env::var("HOME").ok())
    }

    fn config_dir_from(config_home: Option<String>, home: Option<String>) -> Result<PathBuf, Error> {
        let config_home = config_home
            .or_else(|| home.map(|home| format!("{home}/.config")))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::NotFound,
                    "Neither XDG_CONFIG_HOME nor HOME environment variable found",
                )
            })?;

        Ok(PathBuf::from(config_home).join("storewatch"))
    }

    /// Returns the default settings file path
    ///
    /// # Errors
    /// Returns an error if the settings directory cannot be determined
    pub fn default_settings() -> Result<PathBuf, Error> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }

    /// Get the log directory, creating it if needed
    ///
    /// Logs live under `$XDG_STATE_HOME/storewatch/logs`, falling back to
    /// `$HOME/.local/state/storewatch/logs`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be determined or created
    pub fn log_dir() -> Result<PathBuf, Error> {
        let state_home = env::var("XDG_STATE_HOME")
            .or_else(|_| env::var("HOME").map(|home| format!("{home}/.local/state")))
            .map_err(|_| {
                Error::new(
                    ErrorKind::NotFound,
                    "Neither XDG_STATE_HOME nor HOME environment variable found",
                )
            })?;

        let log_dir = PathBuf::from(state_home).join("storewatch").join("logs");
        if !log_dir.exists() {
            std::fs::create_dir_all(&log_dir)?;
        }

        Ok(log_dir)
    }
}
