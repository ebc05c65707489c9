//! Pipeline compiler
//!
//! Turns a [`Pipeline`] into a Tekton [`PipelineRun`] whose embedded pipeline
//! is an ordered list of nodes joined by `runAfter` edges:
//!
//! ```text
//! git-clone -> before-step -> <stage 1 tasks> -> ... -> <stage N tasks> -> after-step
//! ```
//!
//! Tasks within a stage are siblings that all depend on the previous stage's
//! exit nodes (the frontier). Rules can drop a task, job matrices fan it out
//! and artifact paths append an archiver node after it.

mod nodes;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::pipeline::{Pipeline, Task, WHEN_NEVER};
use crate::domain::run::{
    EnvVar, HOOK_ID_ANNOTATION, Param, PipelineRun, PipelineRunSpec, PipelineSpec, PipelineTask,
    SOURCE_REF_ANNOTATION, SOURCE_URL_ANNOTATION, TaskRef, VolumeClaimSource, WorkspaceBinding,
    WorkspaceDeclaration,
};
use crate::expr::{ExprError, ExpressionContext};

pub use nodes::{
    AFTER_STEP_TASK, BEFORE_STEP_TASK, GIT_CLONE_TASK, GIT_INIT_IMAGE, PROJECT_DIR_VAR,
    WORKSPACE_BINDING, WORKSPACE_NAME, WORKSPACE_SOURCE_PATH,
};

/// Value of the managed-by label on compiled runs
pub const MANAGED_BY: &str = "dsl";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("task {task:?} has parameter {param:?} but no expression context is available")]
    MissingEvaluator { task: String, param: String },
}

/// Output settings for compiled runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    /// Image executed for tasks that have artifacts to archive
    pub archiver_image: String,
    /// Passed to the archiver along with the artifact paths
    pub archive_url: String,
    /// `generateName` of the created run
    pub pipeline_run_prefix: String,
    /// Used unless the pipeline names its own service account
    pub default_service_account: String,
    /// Size of the shared workspace volume; read by callers that allocate it
    pub volume_size: String,
}

/// Repository and ref to check out
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub repo_url: String,
    pub git_ref: String,
}

/// Compiles a pipeline into a run
///
/// Without a `context` every rule passes and no task may declare parameters.
/// The checkout node is always emitted, even when rules removed every task.
pub fn compile(
    pipeline: &Pipeline,
    config: &Configuration,
    source: &Source,
    volume_claim: &str,
    context: Option<&ExpressionContext>,
    hook_id: &str,
) -> Result<PipelineRun, CompileError> {
    info!(
        volume_claim,
        repo_url = %source.repo_url,
        git_ref = %source.git_ref,
        "compiling pipeline"
    );

    let env = nodes::base_env(&pipeline.variables);
    let mut tasks = vec![nodes::git_clone(&env, source)];
    let mut frontier = vec![GIT_CLONE_TASK.to_string()];

    if !pipeline.before_script.is_empty() {
        debug!(lines = pipeline.before_script.len(), "adding before_script");
        tasks.push(nodes::script(
            BEFORE_STEP_TASK,
            &frontier,
            &env,
            &pipeline.image,
            &pipeline.before_script,
        ));
        frontier = vec![BEFORE_STEP_TASK.to_string()];
    }

    for stage in &pipeline.stages {
        debug!(stage = %stage, "processing stage");
        let mut exits = Vec::new();

        for task in pipeline.tasks_for_stage(stage) {
            if excluded_by_rules(task, context)? {
                info!(stage = %stage, task = %task.name, "task excluded by rule");
                continue;
            }

            let image = task.image().unwrap_or(pipeline.image.as_str());
            let matrix = nodes::env_matrix(&env, task.jobs());
            let fan_out = matrix.len() > 1;

            for (index, job_env) in matrix.iter().enumerate() {
                let mut name = format!("{}-stage-{}", task.name, stage);
                if fan_out {
                    name = format!("{}-{}", name, index);
                }
                debug!(stage = %stage, task = %task.name, node = %name, "adding task node");

                let node = task_node(task, name, &frontier, job_env, image, context)?;
                let mut exit = node.name.clone();
                tasks.push(node);

                if !task.artifacts.paths.is_empty() {
                    let archiver_name = format!("{}-archiver", exit);
                    tasks.push(nodes::archiver(
                        &archiver_name,
                        &exit,
                        &env,
                        config,
                        &task.artifacts.paths,
                    ));
                    exit = archiver_name;
                }
                exits.push(exit);
            }
        }

        // A stage whose tasks were all excluded leaves the frontier as it was.
        if !exits.is_empty() {
            frontier = exits;
        }
    }

    if !pipeline.after_script.is_empty() {
        debug!(lines = pipeline.after_script.len(), "adding after_script");
        tasks.push(nodes::script(
            AFTER_STEP_TASK,
            &frontier,
            &env,
            &pipeline.image,
            &pipeline.after_script,
        ));
    }

    let service_account = pipeline
        .tekton
        .as_ref()
        .and_then(|t| t.service_account_name.as_deref())
        .filter(|s| !s.is_empty())
        .unwrap_or(config.default_service_account.as_str());

    let spec = PipelineRunSpec {
        service_account_name: service_account.to_string(),
        workspaces: vec![WorkspaceBinding {
            name: WORKSPACE_NAME.to_string(),
            persistent_volume_claim: VolumeClaimSource {
                claim_name: volume_claim.to_string(),
            },
        }],
        pipeline_spec: PipelineSpec {
            workspaces: vec![WorkspaceDeclaration {
                name: WORKSPACE_NAME.to_string(),
            }],
            tasks,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut run = PipelineRun::new(MANAGED_BY, &config.pipeline_run_prefix, spec);
    run.set_annotation(SOURCE_URL_ANNOTATION, source.repo_url.as_str());
    run.set_annotation(SOURCE_REF_ANNOTATION, source.git_ref.as_str());
    run.set_annotation(HOOK_ID_ANNOTATION, hook_id);

    info!(
        nodes = run.spec.pipeline_spec.tasks.len(),
        "compiled pipeline"
    );
    Ok(run)
}

/// True when a rule that evaluates true says `never`
///
/// Every guard is evaluated before any `when` is looked at.
fn excluded_by_rules(task: &Task, context: Option<&ExpressionContext>) -> Result<bool, ExprError> {
    let Some(context) = context else {
        return Ok(false);
    };
    let matched = task
        .rules
        .iter()
        .map(|rule| Ok(context.evaluate(&rule.guard)?.is_true()))
        .collect::<Result<Vec<bool>, ExprError>>()?;
    Ok(task
        .rules
        .iter()
        .zip(matched)
        .any(|(rule, matched)| matched && rule.when == WHEN_NEVER))
}

fn task_node(
    task: &Task,
    name: String,
    run_after: &[String],
    env: &[EnvVar],
    image: &str,
    context: Option<&ExpressionContext>,
) -> Result<PipelineTask, CompileError> {
    let Some(task_ref) = task.task_ref() else {
        return Ok(nodes::script(&name, run_after, env, image, &task.script));
    };

    let params = task
        .params()
        .iter()
        .map(|param| -> Result<Param, CompileError> {
            let context = context.ok_or_else(|| CompileError::MissingEvaluator {
                task: task.name.clone(),
                param: param.name.clone(),
            })?;
            Ok(Param {
                name: param.name.clone(),
                value: context.evaluate_to_string(&param.expr)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PipelineTask {
        name,
        run_after: run_after.to_vec(),
        workspaces: nodes::workspace_bindings(),
        task_ref: Some(TaskRef {
            name: task_ref.to_string(),
            kind: "Task".to_string(),
        }),
        params,
        task_spec: None,
    })
}
