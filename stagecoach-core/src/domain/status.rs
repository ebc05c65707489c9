//! Commit status types
//!
//! What the watcher reports back to the source host for a commit.

use serde::{Deserialize, Serialize};

use super::state::RunState;

/// Context label every status is reported under
pub const STATUS_LABEL: &str = "tekton-ci";

/// Description attached to every status
pub const STATUS_DESCRIPTION: &str = "Tekton CI Status";

/// Commit status states understood by the source host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Failure,
    Success,
    Error,
}

impl From<RunState> for CommitState {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Pending => CommitState::Pending,
            RunState::Failed => CommitState::Failure,
            RunState::Successful => CommitState::Success,
            RunState::Unknown => CommitState::Error,
        }
    }
}

/// A status notification for one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInput {
    pub state: CommitState,
    #[serde(rename = "context")]
    pub label: String,
    pub description: String,
}

impl StatusInput {
    /// Builds the standard notification for a run state
    pub fn for_state(state: RunState) -> Self {
        Self {
            state: state.into(),
            label: STATUS_LABEL.to_string(),
            description: STATUS_DESCRIPTION.to_string(),
        }
    }
}
