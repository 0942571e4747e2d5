use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};

/// Kinds of events published on the change notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Material backing a configuration changed on disk.
    ConfigurationChanged,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::ConfigurationChanged => f.write_str("ConfigurationChanged"),
        }
    }
}

/// A signal that something a configuration depends on has changed.
///
/// Never persisted. Listeners rebuild whatever they derived from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub event_type: EventType,
    /// Canonical path of the file that triggered the event
    pub source_path: PathBuf,
    /// When the change was detected
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates a `ConfigurationChanged` event for the given source.
    pub fn configuration_changed(source_path: impl Into<PathBuf>) -> Self {
        Self {
            event_type: EventType::ConfigurationChanged,
            source_path: source_path.into(),
            timestamp: Utc::now(),
        }
    }
}
