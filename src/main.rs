// ABOUTME: Entry point for the shipyard CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use shipyard::config::{self, Config};
use shipyard::error::Result;
use shipyard::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    match run(cli, mode).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            std::process::exit(e.exit_code());
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<i32> {
    let output = Output::new(mode);

    if let Commands::Init { environment, force } = &cli.command {
        let cwd = env::current_dir()?;
        config::init_config(&cwd, environment.as_deref(), *force)?;
        output.success(&format!("Created {}", config::CONFIG_FILENAME));
        return Ok(0);
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Init { .. } => Ok(0),
        Commands::Deploy {
            environment,
            revision,
            force,
        } => commands::deploy(&config, &environment, &revision, force, output).await,
        Commands::Status { environment } => commands::status(&config, &environment, &output).map(|()| 0),
        Commands::History { environment, limit } => {
            commands::history(&config, &environment, limit, &output)
                .await
                .map(|()| 0)
        }
        Commands::Watch => commands::watch(&config, &output).await.map(|()| 0),
        Commands::Artifacts { revision } => {
            commands::artifacts(&config, revision.as_deref(), &output)
                .await
                .map(|()| 0)
        }
        Commands::Gc { dry_run } => commands::gc(&config, dry_run, &output).await.map(|()| 0),
    }
}
