use thiserror::Error;

use crate::{credentials::StoreConfigError, settings::SettingsError, watch::WatchError};

/// Errors that can occur during CLI command execution.
#[derive(Error, Debug)]
pub enum CliError {
    /// The settings file could not be read or parsed.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// A configured store could not be loaded.
    ///
    /// Carries the store location and the classified cause so users can see
    /// whether the file, the password, or the store type is at fault.
    #[error("Store error: {0}")]
    Store(#[from] StoreConfigError),

    /// Store files could not be watched.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Invalid arguments were provided to a command.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(String),

    /// A background task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Type alias for command execution results.
///
/// Commands return the text to print on success.
pub type CommandResult = Result<String, CliError>;
