use std::path::Path;

use crate::{
    cli::{
        CliError, CommandResult,
        formatting::{StoreSummary, format_summaries_json, format_summary},
    },
    credentials::{SslConfiguration, StoreContext},
    events::ChangeNotifier,
    settings::Settings,
};

/// Loads every store named in the settings file and describes it.
///
/// Stores are loaded without watching, so this works outside a runtime and
/// leaves nothing behind.
///
/// # Errors
///
/// * `CliError::Settings` - If the settings file cannot be read
/// * `CliError::Store` - If any store fails to load
pub fn inspect(settings_path: &Path, json: bool) -> CommandResult {
    let settings = Settings::load(settings_path)?;
    let context = StoreContext::without_watching(ChangeNotifier::new())
        .with_load_timeout(settings.loading.timeout());
    let ssl = SslConfiguration::from_settings(&settings, &context)?;

    let summaries: Vec<StoreSummary> = ssl.stores().map(StoreSummary::from_configuration).collect();

    if json {
        return format_summaries_json(&summaries).map_err(|e| CliError::Output(e.to_string()));
    }

    if summaries.is_empty() {
        return Ok(format!(
            "No stores configured in {}",
            settings_path.display()
        ));
    }

    Ok(summaries
        .iter()
        .map(format_summary)
        .collect::<Vec<_>>()
        .join("\n\n"))
}
