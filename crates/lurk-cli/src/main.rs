use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lurk_cli::commands::{ingest, report};
use lurk_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let now = Local::now().naive_local();
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Ingest { files, read, write }) => {
            ingest::run(&mut stdout, files, read.as_deref(), write.as_deref(), now)?;
        }
        Some(Commands::Report { state, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let state_path = state.as_deref().unwrap_or(&config.state_path);
            report::run(&mut stdout, state_path, &config, *json, now)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
