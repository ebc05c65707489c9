//! Definition Service
//!
//! Turns a push or pull-request hook into a run taken from the repository's
//! run definition file: fetch it at the event's commit, check its filter,
//! bind parameters and submit.

use std::string::FromUtf8Error;
use std::sync::Arc;

use stagecoach_client::{ClientError, Metrics};
use stagecoach_core::hook::{Hook, HookError};
use stagecoach_core::spec::{self, SpecError};
use stagecoach_core::{ExprError, ExpressionContext, PipelineRun, Source};
use thiserror::Error;
use tracing::{error, info};

use crate::repository::{RunRepository, SourceRepository};

#[derive(Debug, Error)]
pub enum DefinitionServiceError {
    #[error(transparent)]
    InvalidHook(#[from] HookError),

    #[error("error fetching pipeline file: {0}")]
    Fetch(#[source] ClientError),

    #[error("pipeline definition is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),

    #[error(transparent)]
    Context(#[from] ExprError),

    #[error("error executing pipeline definition: {0}")]
    Definition(#[from] SpecError),

    #[error("error creating pipelinerun: {0}")]
    CreateRun(#[source] ClientError),
}

pub type Result<T> = std::result::Result<T, DefinitionServiceError>;

pub struct DefinitionService {
    definition_filename: String,
    pipeline_run_prefix: String,
    source: Arc<dyn SourceRepository>,
    runs: Arc<dyn RunRepository>,
    metrics: Arc<dyn Metrics>,
}

impl DefinitionService {
    pub fn new(
        definition_filename: impl Into<String>,
        pipeline_run_prefix: impl Into<String>,
        source: Arc<dyn SourceRepository>,
        runs: Arc<dyn RunRepository>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self {
            definition_filename: definition_filename.into(),
            pipeline_run_prefix: pipeline_run_prefix.into(),
            source,
            runs,
            metrics,
        }
    }

    /// Handles one delivery
    ///
    /// Returns the created run, or `None` when the repository has no
    /// definition or its filter did not match.
    pub async fn handle(
        &self,
        kind: &str,
        delivery_id: &str,
        body: &[u8],
    ) -> Result<Option<PipelineRun>> {
        let hook = match Hook::parse(kind, body) {
            Ok(hook) => hook,
            Err(e) => {
                error!("error parsing webhook: {}", e);
                self.metrics.count_invalid_hook();
                return Err(e.into());
            }
        };
        self.metrics.count_hook(hook.kind());

        let repo = hook.repo_full_name();
        let sha = hook.commit_sha();
        info!(repo, sha, kind = hook.kind(), "processing run definition");

        let content = match self
            .source
            .file_contents(repo, &self.definition_filename, sha)
            .await
        {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                info!(repo, "no pipeline definition found");
                return Ok(None);
            }
            Err(e) => return Err(DefinitionServiceError::Fetch(e)),
        };

        let definition = spec::parse(&String::from_utf8(content)?)?;
        let context = ExpressionContext::new(&hook)?;
        let source = Source {
            repo_url: hook.clone_url().to_string(),
            git_ref: sha.to_string(),
        };

        let Some(run) = spec::execute(
            definition,
            &context,
            &self.pipeline_run_prefix,
            &source,
            delivery_id,
        )?
        else {
            return Ok(None);
        };

        let created = self
            .runs
            .create_run(&run)
            .await
            .map_err(DefinitionServiceError::CreateRun)?;

        info!(repo, sha, run = created.display_name(), "created pipelinerun");
        Ok(Some(created))
    }
}
