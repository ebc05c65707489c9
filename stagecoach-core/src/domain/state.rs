//! Run state machine
//!
//! Derives a reportable state from a run's `Succeeded` condition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::run::PipelineRun;

/// Reportable state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// The run has not completed yet
    Pending,
    /// At least one task failed
    Failed,
    /// Every task completed successfully
    Successful,
    /// The engine reported a condition status this service doesn't know
    Unknown,
}

impl RunState {
    /// Derives the state from a run's `Succeeded` condition
    ///
    /// A missing condition means the engine hasn't started reporting yet,
    /// which is still pending.
    pub fn from_run(run: &PipelineRun) -> Self {
        match run.succeeded_condition() {
            Some("True") => RunState::Successful,
            Some("False") => RunState::Failed,
            Some("Unknown") | None => RunState::Pending,
            Some(_) => RunState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "Pending",
            RunState::Failed => "Failed",
            RunState::Successful => "Successful",
            RunState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RunState::Pending),
            "Failed" => Ok(RunState::Failed),
            "Successful" => Ok(RunState::Successful),
            "Unknown" => Ok(RunState::Unknown),
            other => Err(format!("unknown run state: {}", other)),
        }
    }
}
