use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading settings files.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be read
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where the I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// The settings file is not valid TOML for the settings schema
    #[error("failed to parse TOML from {location}: {details}")]
    TomlParseError {
        /// Location of the TOML (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// No settings directory could be determined
    #[error("cannot determine settings directory: {details}")]
    NoSettingsDir {
        /// Why the lookup failed
        details: String,
    },
}
