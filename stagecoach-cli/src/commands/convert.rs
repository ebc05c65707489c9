//! Convert command
//!
//! Compiles a pipeline file without a triggering event and prints the run as
//! YAML. With no event there is nothing for rules or parameters to evaluate:
//! every rule passes and tasks with parameters are rejected.

use anyhow::{Context, Result};
use clap::Args;
use stagecoach_core::{Configuration, Source, compile};

use super::load_pipeline;

/// Volume claim the compiled run binds its workspace to
const VOLUME_CLAIM: &str = "shared-task-storage";

/// Correlation id recorded on the compiled run
const HOOK_ID: &str = "unique-id";

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Path to the pipeline file
    #[arg(long)]
    pub pipeline_file: String,

    /// Repository to check out
    #[arg(long)]
    pub repository_url: String,

    /// Branch or commit to check out
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Image used for artifact archiving
    #[arg(long, env = "ARCHIVER_IMAGE", default_value = "quay.io/kmcdermo/archiver:latest")]
    pub archiver_image: String,

    /// Where archived artifacts are uploaded
    #[arg(long, env = "ARCHIVE_URL", default_value = "gs://archive-bucket")]
    pub archive_url: String,

    /// generateName of the run
    #[arg(long, env = "PIPELINERUN_PREFIX", default_value = "test-pipelinerun-")]
    pub pipelinerun_prefix: String,

    /// Service account the run executes as
    #[arg(long, env = "PIPELINERUN_SERVICE_ACCOUNT", default_value = "default")]
    pub service_account: String,
}

impl ConvertArgs {
    fn configuration(&self) -> Configuration {
        Configuration {
            archiver_image: self.archiver_image.clone(),
            archive_url: self.archive_url.clone(),
            pipeline_run_prefix: self.pipelinerun_prefix.clone(),
            default_service_account: self.service_account.clone(),
            ..Default::default()
        }
    }
}

pub fn handle_convert(args: &ConvertArgs) -> Result<()> {
    print!("{}", render(args)?);
    Ok(())
}

/// Compiles the pipeline file and renders the run as YAML
fn render(args: &ConvertArgs) -> Result<String> {
    let pipeline = load_pipeline(&args.pipeline_file)?;
    let source = Source {
        repo_url: args.repository_url.clone(),
        git_ref: args.branch.clone(),
    };

    let run = compile(
        &pipeline,
        &args.configuration(),
        &source,
        VOLUME_CLAIM,
        None,
        HOOK_ID,
    )
    .context("Failed to compile pipeline")?;

    serde_yaml::to_string(&run).context("Failed to encode PipelineRun")
}
