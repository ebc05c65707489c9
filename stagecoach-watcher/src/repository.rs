//! Repositories
//!
//! The watcher reads and annotates runs on the engine and reports commit
//! statuses to the source host. Both sides sit behind traits so the state
//! handling can be exercised without either service.

use async_trait::async_trait;
use stagecoach_client::{ClientError, EngineClient, ScmClient};
use stagecoach_core::PipelineRun;
use stagecoach_core::domain::run::label_selector;
use stagecoach_core::domain::status::StatusInput;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Lists every run created by this service
    async fn list_runs(&self) -> Result<Vec<PipelineRun>, ClientError>;

    /// Persists a modified run
    async fn update_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError>;
}

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Reports a status for a commit in `repo` (`owner/name`)
    async fn notify(&self, repo: &str, sha: &str, status: &StatusInput) -> Result<(), ClientError>;
}

#[async_trait]
impl RunStore for EngineClient {
    async fn list_runs(&self) -> Result<Vec<PipelineRun>, ClientError> {
        EngineClient::list_runs(self, &label_selector()).await
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError> {
        EngineClient::update_run(self, run).await
    }
}

#[async_trait]
impl StatusNotifier for ScmClient {
    async fn notify(&self, repo: &str, sha: &str, status: &StatusInput) -> Result<(), ClientError> {
        self.create_status(repo, sha, status).await
    }
}
