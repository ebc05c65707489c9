//! Source host client

use std::sync::Arc;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use stagecoach_core::domain::status::StatusInput;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::handle_empty_response;
use crate::metrics::Metrics;

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const CLIENT_AGENT: &str = "stagecoach";

/// Client for a GitHub-style REST API
#[derive(Clone)]
pub struct ScmClient {
    base_url: String,
    token: Option<String>,
    client: Client,
    metrics: Arc<dyn Metrics>,
}

impl ScmClient {
    pub fn new(base_url: impl Into<String>, metrics: Arc<dyn Metrics>) -> Self {
        Self::with_client(base_url, metrics, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, metrics: Arc<dyn Metrics>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
            metrics,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, request: RequestBuilder, media_type: &str) -> RequestBuilder {
        let request = request
            .header(ACCEPT, media_type)
            .header(USER_AGENT, CLIENT_AGENT);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn record<T>(&self, name: &str, result: Result<T>) -> Result<T> {
        self.metrics.count_api_call(name);
        // A missing file is an expected answer, not a failed call.
        if matches!(&result, Err(e) if !e.is_not_found()) {
            self.metrics.count_failed_api_call(name);
        }
        result
    }

    /// Fetches the raw contents of `path` in `repo` (`owner/name`) at `git_ref`
    ///
    /// Returns [`ClientError::NotFound`] when the file doesn't exist.
    pub async fn file_contents(&self, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        let url = format!("{}/repos/{}/contents/{}", self.base_url, repo, path);
        let request = self
            .request(self.client.get(&url), RAW_MEDIA_TYPE)
            .query(&[("ref", git_ref)]);

        let result = match request.send().await {
            Ok(response) => read_raw(response, repo, path, git_ref).await,
            Err(e) => Err(e.into()),
        };

        if let Ok(body) = &result {
            debug!(repo, path, git_ref, bytes = body.len(), "fetched file contents");
        }
        self.record("file_contents", result)
    }

    /// Reports a commit status
    pub async fn create_status(&self, repo: &str, sha: &str, status: &StatusInput) -> Result<()> {
        let url = format!("{}/repos/{}/statuses/{}", self.base_url, repo, sha);
        let request = self.request(self.client.post(&url), JSON_MEDIA_TYPE).json(status);

        let result = match request.send().await {
            Ok(response) => handle_empty_response(response).await,
            Err(e) => Err(e.into()),
        };
        self.record("create_status", result)
    }
}

async fn read_raw(
    response: reqwest::Response,
    repo: &str,
    path: &str,
    git_ref: &str,
) -> Result<Vec<u8>> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(format!("{}/{}@{}", repo, path, git_ref)));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ClientError::api_error(status.as_u16(), message));
    }
    Ok(response.bytes().await?.to_vec())
}
