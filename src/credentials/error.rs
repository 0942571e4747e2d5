use std::io;

use thiserror::Error;

/// Failure category for credential store loading.
///
/// Every failure raised while loading a store is mapped onto exactly one of
/// these variants before it reaches the caller.
#[derive(Error, Debug)]
pub enum StoreErrorKind {
    /// The bytes are not a valid store of the requested type, or the password
    /// does not match the store's integrity check.
    #[error("unsupported store format or incorrect password: {details}")]
    FormatOrPassword {
        /// Parser or integrity check details
        details: String,
    },

    /// The algorithm protecting the store is not available in this build.
    #[error("integrity or protection algorithm unavailable: {details}")]
    AlgorithmUnavailable {
        /// Name or description of the missing algorithm
        details: String,
    },

    /// The store engine for the requested type failed or does not exist.
    #[error("store engine failure for type '{store_type}': {details}")]
    StoreEngine {
        /// Store type that was requested
        store_type: String,
        /// Engine failure details
        details: String,
    },

    /// The location does not point at an existing source.
    #[error("credential source not found: {0}")]
    SourceNotFound(#[source] io::Error),

    /// Any other I/O failure while resolving or reading the source.
    #[error("I/O error reading credential source: {0}")]
    Io(#[source] io::Error),

    /// The combination of parameters is not allowed.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreErrorKind {
    /// Maps an I/O error from source resolution onto the store taxonomy.
    pub fn from_source_error(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StoreErrorKind::SourceNotFound(error),
            _ => StoreErrorKind::Io(error),
        }
    }

    pub(crate) fn format(details: impl Into<String>) -> Self {
        StoreErrorKind::FormatOrPassword {
            details: details.into(),
        }
    }

    pub(crate) fn engine(store_type: &str, details: impl Into<String>) -> Self {
        StoreErrorKind::StoreEngine {
            store_type: store_type.to_string(),
            details: details.into(),
        }
    }
}

/// Error returned when a credential store configuration cannot be built.
///
/// Carries the location that triggered the failure so that callers can report
/// it without keeping their own copy.
#[derive(Error, Debug)]
#[error("failed to load credential store from {}: {cause}", display_location(.location))]
pub struct StoreConfigError {
    /// Location the store was being loaded from, if any
    pub location: Option<String>,
    /// Classified cause
    #[source]
    pub cause: StoreErrorKind,
}

impl StoreConfigError {
    /// Creates an error for the given location and cause.
    pub fn new(location: Option<&str>, cause: StoreErrorKind) -> Self {
        Self {
            location: location.map(str::to_string),
            cause,
        }
    }
}

fn display_location(location: &Option<String>) -> &str {
    location.as_deref().unwrap_or("<in-memory>")
}
