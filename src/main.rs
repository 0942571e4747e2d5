//! Storewatch command-line entry point.

use std::{error::Error, process};

use clap::Parser;
use storewatch::{
    cli::{Cli, formatting::format_error},
    tracing_config,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let _guard = if cli.command.is_long_running() {
        let guard = tracing_config::init_with_file()?;
        Some(guard)
    } else {
        tracing_config::init()?;
        None
    };

    info!(command = ?cli.command, "Starting storewatch");

    match cli.command.run().await {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}
