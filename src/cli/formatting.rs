//! Formatting utilities for CLI output.
//!
//! Store summaries are rendered either as styled text for terminals or as
//! JSON for scripts.

use serde::Serialize;

use crate::{
    credentials::{StoreConfiguration, StoreEntry},
    events::ChangeEvent,
};

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats store aliases with styling
pub fn format_alias(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::GREEN, text, Colors::RESET)
}

/// Formats secondary details with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats change notifications with styling
pub fn format_notice(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::YELLOW, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// What `inspect` reports about one configured store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// `key store` or `trust store`
    pub role: String,
    /// Configured location, absent for in-memory stores
    pub location: Option<String>,
    /// Store type as configured
    pub store_type: String,
    /// Canonical path of the watched file
    pub watched_path: Option<String>,
    /// Entries in store order
    pub entries: Vec<EntrySummary>,
}

/// One entry of a [`StoreSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    /// Entry alias
    pub alias: String,
    /// `private-key` or `trusted-certificate`
    pub kind: &'static str,
    /// Number of certificates attached to the entry
    pub certificates: usize,
    /// RFC 3339 creation time, when the store records one
    pub created: Option<String>,
}

impl StoreSummary {
    /// Summarises a loaded store configuration. Key material is never
    /// included.
    pub fn from_configuration(configuration: &StoreConfiguration) -> Self {
        Self {
            role: configuration.role().to_string(),
            location: configuration.location().map(str::to_string),
            store_type: configuration.store_type().to_string(),
            watched_path: configuration
                .watched_path()
                .map(|path| path.display().to_string()),
            entries: configuration
                .credential_store()
                .entries()
                .iter()
                .map(EntrySummary::from_entry)
                .collect(),
        }
    }
}

impl EntrySummary {
    fn from_entry(entry: &StoreEntry) -> Self {
        let (kind, created) = match entry {
            StoreEntry::PrivateKey { created, .. } => ("private-key", created),
            StoreEntry::TrustedCertificate { created, .. } => ("trusted-certificate", created),
        };

        Self {
            alias: entry.alias().to_string(),
            kind,
            certificates: entry.certificates().len(),
            created: created.map(|time| time.to_rfc3339()),
        }
    }
}

/// Renders a store summary for terminal output.
pub fn format_summary(summary: &StoreSummary) -> String {
    let mut lines = vec![format_header(&format!(
        "{} ({}) at {}",
        summary.role,
        summary.store_type,
        summary.location.as_deref().unwrap_or("<in-memory>")
    ))];

    if let Some(path) = &summary.watched_path {
        lines.push(format_description(&format!("  watching {path}")));
    }

    if summary.entries.is_empty() {
        lines.push(format_description("  no entries"));
    }

    for entry in &summary.entries {
        let created = entry
            .created
            .as_deref()
            .map(|time| format!(", created {time}"))
            .unwrap_or_default();
        lines.push(format!(
            "  {} {}",
            format_alias(&entry.alias),
            format_description(&format!(
                "{}, {} certificate(s){created}",
                entry.kind, entry.certificates
            ))
        ));
    }

    lines.join("\n")
}

/// Renders store summaries as pretty-printed JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_summaries_json(summaries: &[StoreSummary]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summaries)
}

/// Renders a change event as one line.
pub fn format_event(event: &ChangeEvent) -> String {
    format!(
        "[{}] {} {}",
        event.timestamp.to_rfc3339(),
        format_notice(&event.event_type.to_string()),
        event.source_path.display()
    )
}
