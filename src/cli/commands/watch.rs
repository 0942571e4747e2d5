use std::{path::Path, sync::Arc};

use tracing::{info, warn};

use crate::{
    cli::{
        CliError, CommandResult,
        formatting::{format_error, format_event},
    },
    credentials::{SslConfiguration, StoreContext},
    events::{ChangeNotifier, EventType},
    settings::Settings,
};

/// Loads the configured stores and prints a line for every change to their
/// files until Ctrl+C.
///
/// Stores are rebuilt after each change. A rebuild that fails keeps the
/// previous stores in place.
///
/// # Errors
///
/// * `CliError::Settings` - If the settings file cannot be read
/// * `CliError::Watch` - If watching is requested outside a runtime
/// * `CliError::Store` - If a store fails to load initially
/// * `CliError::InvalidArguments` - If no configured store has a file to watch
/// * `CliError::Task` - If the loading task panics
pub async fn watch(settings_path: &Path) -> CommandResult {
    let settings = Settings::load(settings_path)?;
    let notifier = ChangeNotifier::new();
    let (_subscription, mut changes) =
        notifier.subscribe_channel(EventType::ConfigurationChanged, None);
    let context = StoreContext::from_settings(&settings, Arc::clone(&notifier))?;

    let mut ssl = load(&settings, &context).await?;
    let paths = ssl.watched_paths();
    if paths.is_empty() {
        return Err(CliError::InvalidArguments(format!(
            "no watchable store file in {}",
            settings_path.display()
        )));
    }

    for path in &paths {
        println!("Watching '{}'...", path.display());
    }
    println!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = changes.recv() => {
                let Some(event) = event else { break };
                println!("{}", format_event(&event));

                match load(&settings, &context).await {
                    Ok(reloaded) => {
                        info!(source = %event.source_path.display(), "Stores reloaded");
                        ssl = reloaded;
                    }
                    Err(e) => {
                        warn!(error = %e, "Keeping previous stores");
                        eprintln!("{}", format_error(&e.to_string()));
                    }
                }
            }
        }
    }

    drop(ssl);
    Ok("Watch ended".to_string())
}

/// Builds the stores on the blocking pool; store reads can stall for up to
/// the load timeout.
async fn load(settings: &Settings, context: &StoreContext) -> Result<SslConfiguration, CliError> {
    let settings = settings.clone();
    let context = context.clone();

    let ssl = tokio::task::spawn_blocking(move || SslConfiguration::from_settings(&settings, &context))
        .await??;

    Ok(ssl)
}
