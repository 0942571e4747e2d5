//! Command-line interface for inspecting and watching credential stores.

mod commands;
pub mod formatting;
mod types;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::{Settings, SettingsError};

pub use commands::{inspect, watch};
pub use types::{CliError, CommandResult};

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "storewatch")]
#[command(about = "Load TLS credential stores and watch them for changes")]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load the configured stores and describe their entries
    Inspect {
        /// Settings file naming the stores [default: $XDG_CONFIG_HOME/storewatch/settings.toml]
        settings: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Load the configured stores and report changes until Ctrl+C
    Watch {
        /// Settings file naming the stores [default: $XDG_CONFIG_HOME/storewatch/settings.toml]
        settings: Option<PathBuf>,
    },
}

impl Commands {
    /// Whether the command runs until interrupted.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Watch { .. })
    }

    /// Settings file the command reads, falling back to the default
    /// location when none was given.
    ///
    /// # Errors
    /// Returns error if no path was given and the settings directory cannot
    /// be determined.
    pub fn settings_path(&self) -> Result<PathBuf, SettingsError> {
        let (Commands::Inspect { settings, .. } | Commands::Watch { settings }) = self;
        Settings::resolve_path(settings.as_deref())
    }

    /// Runs the command and returns the text to print.
    ///
    /// # Errors
    /// Returns whatever the command fails with.
    pub async fn run(&self) -> CommandResult {
        let settings = self.settings_path()?;

        match self {
            Commands::Inspect { json, .. } => inspect(&settings, *json),
            Commands::Watch { .. } => watch(&settings).await,
        }
    }
}
