//! Pipeline DSL decoding
//!
//! Decodes a `.tekton_ci.yaml` document into a [`Pipeline`]. The top-level
//! mapping is walked in document order: a handful of reserved keys configure
//! the pipeline and every other key is a task.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use thiserror::Error;
use tracing::debug;

use crate::domain::pipeline::{
    Artifacts, DEFAULT_STAGE, Pipeline, Rule, Task, TaskParam, TektonConfig, TektonTask,
};

#[derive(Debug, Error)]
pub enum DslError {
    #[error("failed to decode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid task {task:?}: {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("bad Tekton task parameter in {task:?}: {reason}")]
    InvalidParam { task: String, reason: String },

    #[error("invalid job in {task:?}: could not parse {entry:?} as an environment variable")]
    InvalidJob { task: String, entry: String },
}

/// A task as written in the DSL, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskDefinition {
    stage: Option<String>,
    script: Vec<String>,
    rules: Vec<Rule>,
    artifacts: Option<Artifacts>,
    tekton: Option<TektonTaskDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TektonTaskDefinition {
    task_ref: Option<String>,
    image: Option<String>,
    jobs: Vec<String>,
    params: Vec<ParamDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParamDefinition {
    name: String,
    expr: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TektonConfigDefinition {
    service_account_name: Option<String>,
}

/// Parses pipeline YAML into a validated [`Pipeline`]
pub fn parse(input: &str) -> Result<Pipeline, DslError> {
    let root: Mapping = match serde_yaml::from_str::<Option<Mapping>>(input)? {
        Some(root) => root,
        None => Mapping::new(),
    };

    let mut pipeline = Pipeline::default();
    for (key, value) in root {
        let key: String = serde_yaml::from_value(key)?;
        match key.as_str() {
            "image" => pipeline.image = serde_yaml::from_value(value)?,
            "variables" => pipeline.variables = serde_yaml::from_value(value)?,
            "before_script" => pipeline.before_script = serde_yaml::from_value(value)?,
            "after_script" => pipeline.after_script = serde_yaml::from_value(value)?,
            "stages" => pipeline.stages = serde_yaml::from_value(value)?,
            "tekton" => {
                let config: TektonConfigDefinition = serde_yaml::from_value(value)?;
                pipeline.tekton = Some(TektonConfig {
                    service_account_name: config.service_account_name,
                });
            }
            _ => pipeline.tasks.push(parse_task(key, value)?),
        }
    }

    if pipeline.stages.is_empty() {
        pipeline.stages = pipeline.implicit_stages();
        if pipeline.stages.is_empty() {
            pipeline.stages.push(DEFAULT_STAGE.to_string());
        }
    }

    debug!(
        stages = ?pipeline.stages,
        tasks = pipeline.tasks.len(),
        "decoded pipeline"
    );
    Ok(pipeline)
}

fn parse_task(name: String, value: YamlValue) -> Result<Task, DslError> {
    let definition: TaskDefinition =
        serde_yaml::from_value(value).map_err(|e| DslError::InvalidTask {
            task: name.clone(),
            reason: e.to_string(),
        })?;

    let tekton = definition
        .tekton
        .map(|t| parse_tekton_task(&name, t))
        .transpose()?;

    if definition.script.is_empty() && tekton.is_none() {
        return Err(DslError::InvalidTask {
            task: name,
            reason: "missing script".to_string(),
        });
    }

    let has_task_ref = tekton
        .as_ref()
        .and_then(|t| t.task_ref.as_deref())
        .is_some_and(|r| !r.is_empty());
    if !definition.script.is_empty() && has_task_ref {
        return Err(DslError::InvalidTask {
            task: name,
            reason: "provided Tekton taskRef and script".to_string(),
        });
    }

    let stage = definition
        .stage
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STAGE.to_string());

    Ok(Task {
        name,
        stage,
        script: definition.script,
        rules: definition.rules,
        artifacts: definition.artifacts.unwrap_or_default(),
        tekton,
    })
}

fn parse_tekton_task(task: &str, definition: TektonTaskDefinition) -> Result<TektonTask, DslError> {
    let jobs = definition
        .jobs
        .into_iter()
        .map(|entry| parse_job(task, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let params = definition
        .params
        .into_iter()
        .map(|p| {
            if p.name.is_empty() || p.expr.is_empty() {
                return Err(DslError::InvalidParam {
                    task: task.to_string(),
                    reason: format!("name {:?} and expr {:?} are both required", p.name, p.expr),
                });
            }
            Ok(TaskParam {
                name: p.name,
                expr: p.expr,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TektonTask {
        task_ref: definition.task_ref,
        image: definition.image,
        jobs,
        params,
    })
}

/// A job matrix entry is a single `KEY=VALUE` pair
fn parse_job(task: &str, entry: String) -> Result<BTreeMap<String, String>, DslError> {
    let parts: Vec<&str> = entry.split('=').collect();
    match parts.as_slice() {
        [key, value] => Ok(BTreeMap::from([(key.to_string(), value.to_string())])),
        _ => Err(DslError::InvalidJob {
            task: task.to_string(),
            entry,
        }),
    }
}
