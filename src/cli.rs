// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Build, store, and roll out artifacts with automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shipyard.yml configuration file
    Init {
        /// Name of the first environment
        #[arg(short, long)]
        environment: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Build a revision and roll it out to an environment
    Deploy {
        environment: String,

        /// Commit, tag, or branch to deploy
        revision: String,

        /// Break a deploy lock held by another process
        #[arg(short, long)]
        force: bool,
    },

    /// Show an environment's current state
    Status { environment: String },

    /// Show an environment's past rollout attempts, newest first
    History {
        environment: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Follow tracked branches and the webhook, deploying as they move
    Watch,

    /// List stored artifacts
    Artifacts {
        /// Only artifacts built from this revision
        #[arg(short, long)]
        revision: Option<String>,
    },

    /// Remove artifacts nothing refers to any more
    Gc {
        /// Report what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}
