//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod convert;
mod validate;

pub use convert::ConvertArgs;

use anyhow::{Context, Result};
use clap::Subcommand;
use stagecoach_core::Pipeline;
use std::fs;
use std::path::Path;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Compile a pipeline file and print the resulting PipelineRun
    Convert(ConvertArgs),
    /// Check that a pipeline file decodes
    Validate {
        /// Path to the pipeline file
        file: String,
    },
}

/// Routes a command to its handler
pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Convert(args) => convert::handle_convert(&args),
        Commands::Validate { file } => validate::handle_validate(&file),
    }
}

/// Reads and decodes a pipeline file
fn load_pipeline(path: impl AsRef<Path>) -> Result<Pipeline> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    stagecoach_core::dsl::parse(&contents)
        .with_context(|| format!("Failed to decode pipeline file: {}", path.display()))
}
