//! Pipeline domain types
//!
//! The typed form of a `.tekton_ci.yaml` definition, produced by
//! [`crate::dsl::parse`] and consumed by the compiler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stage assigned to tasks that don't declare one.
pub const DEFAULT_STAGE: &str = "default";

/// Directive that removes a task from the compiled run.
pub const WHEN_NEVER: &str = "never";

/// Parsed pipeline definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub image: String,
    pub variables: BTreeMap<String, String>,
    pub before_script: Vec<String>,
    pub after_script: Vec<String>,
    /// Stage names in execution order
    pub stages: Vec<String>,
    /// Tasks in declaration order
    pub tasks: Vec<Task>,
    pub tekton: Option<TektonConfig>,
}

impl Pipeline {
    /// Returns the tasks for a stage, in declaration order
    pub fn tasks_for_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.stage == stage)
    }

    /// Looks up a task by name
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Distinct task stages in first-seen order
    pub fn implicit_stages(&self) -> Vec<String> {
        let mut stages: Vec<String> = Vec::new();
        for task in &self.tasks {
            if !stages.contains(&task.stage) {
                stages.push(task.stage.clone());
            }
        }
        stages
    }
}

/// Pipeline-wide execution engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TektonConfig {
    pub service_account_name: Option<String>,
}

/// A named unit of work assigned to a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub stage: String,
    pub script: Vec<String>,
    pub rules: Vec<Rule>,
    pub artifacts: Artifacts,
    pub tekton: Option<TektonTask>,
}

impl Task {
    /// The external task this task delegates to, if any
    pub fn task_ref(&self) -> Option<&str> {
        self.tekton
            .as_ref()
            .and_then(|t| t.task_ref.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// The image override for this task, if any
    pub fn image(&self) -> Option<&str> {
        self.tekton
            .as_ref()
            .and_then(|t| t.image.as_deref())
            .filter(|i| !i.is_empty())
    }

    /// Job matrix entries (empty when the task isn't a matrix)
    pub fn jobs(&self) -> &[BTreeMap<String, String>] {
        self.tekton.as_ref().map(|t| t.jobs.as_slice()).unwrap_or(&[])
    }

    /// Parameter bindings passed to the external task
    pub fn params(&self) -> &[TaskParam] {
        self.tekton.as_ref().map(|t| t.params.as_slice()).unwrap_or(&[])
    }
}

/// Guard expression plus the directive applied when it evaluates true
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    #[serde(rename = "if")]
    pub guard: String,
    pub when: String,
}

/// Paths archived once a task has finished
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifacts {
    pub paths: Vec<String>,
}

/// Execution-engine specific task settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TektonTask {
    pub task_ref: Option<String>,
    pub image: Option<String>,
    /// One map of extra environment variables per matrix entry
    pub jobs: Vec<BTreeMap<String, String>>,
    pub params: Vec<TaskParam>,
}

/// Parameter name and the expression that produces its value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParam {
    pub name: String,
    pub expr: String,
}
