//! Stagecoach CLI
//!
//! Offline tooling for pipeline files: compile one to the run the webhook
//! service would create, or check that it decodes.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};

#[derive(Parser)]
#[command(name = "stagecoach")]
#[command(about = "Stagecoach pipeline file tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    handle_command(cli.command)
}
