//! Webhook event types
//!
//! Typed forms of the push and pull-request events delivered by the source
//! host. Field names follow the host's JSON payloads, which is also how they
//! appear to expressions under the `hook` binding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unsupported event kind: {0}")]
    UnsupportedEvent(String),

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A parsed webhook event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hook {
    Push(PushHook),
    PullRequest(PullRequestHook),
}

impl Hook {
    /// Parses a payload given the event kind header (e.g. `X-GitHub-Event`)
    pub fn parse(kind: &str, body: &[u8]) -> Result<Self, HookError> {
        let invalid = |source| HookError::InvalidPayload {
            kind: kind.to_string(),
            source,
        };
        match kind {
            "push" => Ok(Hook::Push(serde_json::from_slice(body).map_err(invalid)?)),
            "pull_request" => Ok(Hook::PullRequest(
                serde_json::from_slice(body).map_err(invalid)?,
            )),
            other => Err(HookError::UnsupportedEvent(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Hook::Push(_) => "push",
            Hook::PullRequest(_) => "pull_request",
        }
    }

    pub fn repository(&self) -> &Repository {
        match self {
            Hook::Push(p) => &p.repository,
            Hook::PullRequest(p) => &p.repository,
        }
    }

    /// `owner/name` of the repository
    pub fn repo_full_name(&self) -> &str {
        &self.repository().full_name
    }

    pub fn clone_url(&self) -> &str {
        &self.repository().clone_url
    }

    /// The commit the event is about
    pub fn commit_sha(&self) -> &str {
        match self {
            Hook::Push(p) => p.commit_sha(),
            Hook::PullRequest(p) => &p.pull_request.head.sha,
        }
    }

    /// The hook as a generic JSON document
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushHook {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    pub repository: Repository,
    #[serde(default)]
    pub head_commit: Option<Commit>,
    #[serde(default)]
    pub sender: Option<User>,
}

impl PushHook {
    pub fn commit_sha(&self) -> &str {
        match &self.head_commit {
            Some(commit) if !commit.id.is_empty() => &commit.id,
            _ => &self.after,
        }
    }

    pub fn commit_message(&self) -> &str {
        self.head_commit
            .as_ref()
            .map(|c| c.message.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestHook {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub head: GitRef,
    pub base: GitRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}
