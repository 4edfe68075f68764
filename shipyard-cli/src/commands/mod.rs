//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;
mod gate;
mod run;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline for a branch or tag
    Run(run::RunArgs),
    /// Validate a pipeline definition
    Check {
        /// Path to the definition file (.lua or .json)
        #[arg(short, long, env = "SHIPYARD_DEFINITION")]
        definition: PathBuf,
    },
    /// Show whether a branch or tag would deploy
    Gate {
        /// Branch or tag name
        #[arg(value_name = "REF")]
        ref_name: String,

        /// Take the allow-list from this definition file
        #[arg(short, long, conflicts_with = "allow")]
        definition: Option<PathBuf>,

        /// Allowed ref pattern; may be repeated
        #[arg(short, long)]
        allow: Vec<String>,
    },
}

/// Routes a command to its handler
pub async fn handle_command(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => run::handle_run(args).await,
        Commands::Check { definition } => check::handle_check(&definition),
        Commands::Gate {
            ref_name,
            definition,
            allow,
        } => gate::handle_gate(&ref_name, definition.as_deref(), allow),
    }
}
