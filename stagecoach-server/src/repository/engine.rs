//! Engine repositories
//!
//! Creating runs and allocating their shared workspace volumes.

use async_trait::async_trait;
use stagecoach_client::{ClientError, EngineClient};
use stagecoach_core::PipelineRun;

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Submits a compiled run, returning it as created
    async fn create_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError>;
}

#[async_trait]
pub trait VolumeRepository: Send + Sync {
    /// Allocates a shared volume of `size`, returning the claim name
    async fn create_volume(&self, size: &str) -> Result<String, ClientError>;
}

#[async_trait]
impl RunRepository for EngineClient {
    async fn create_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError> {
        EngineClient::create_run(self, run).await
    }
}

#[async_trait]
impl VolumeRepository for EngineClient {
    async fn create_volume(&self, size: &str) -> Result<String, ClientError> {
        EngineClient::create_volume(self, size).await
    }
}
