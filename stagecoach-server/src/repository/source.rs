//! Source repository
//!
//! Reads pipeline files from the source host.

use async_trait::async_trait;
use stagecoach_client::{ClientError, ScmClient};

#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Fetches a file at a specific commit
    ///
    /// A missing file is reported as an error for which
    /// [`ClientError::is_not_found`] is true.
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl SourceRepository for ScmClient {
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, ClientError> {
        ScmClient::file_contents(self, repo, path, git_ref).await
    }
}
