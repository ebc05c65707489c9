//! Builders for the individual graph nodes

use std::collections::BTreeMap;

use crate::domain::run::{
    EnvVar, PipelineTask, Step, TaskSpec, WorkspaceDeclaration, WorkspaceTaskBinding,
};

use super::Configuration;
use super::Source;

pub const GIT_CLONE_TASK: &str = "git-clone";
pub const BEFORE_STEP_TASK: &str = "before-step";
pub const AFTER_STEP_TASK: &str = "after-step";

/// Workspace declared by the run and bound to the volume claim
pub const WORKSPACE_NAME: &str = "git-checkout";
/// Name each task uses for the shared workspace
pub const WORKSPACE_BINDING: &str = "source";
pub const WORKSPACE_SOURCE_PATH: &str = "$(workspaces.source.path)";

pub const PROJECT_DIR_VAR: &str = "CI_PROJECT_DIR";

pub const GIT_INIT_IMAGE: &str = "gcr.io/tekton-releases/github.com/tektoncd/pipeline/cmd/git-init";
const GIT_INIT_COMMAND: &str = "/ko-app/git-init";
const GIT_RESOURCE_NAME: &str = "tekton-ci-git-clone";

/// Pipeline variables followed by the workspace location
pub fn base_env(variables: &BTreeMap<String, String>) -> Vec<EnvVar> {
    variables
        .iter()
        .map(|(k, v)| EnvVar::new(k, v))
        .chain(std::iter::once(EnvVar::new(
            PROJECT_DIR_VAR,
            WORKSPACE_SOURCE_PATH,
        )))
        .collect()
}

/// One environment per job matrix entry, or the base environment alone
pub fn env_matrix(base: &[EnvVar], jobs: &[BTreeMap<String, String>]) -> Vec<Vec<EnvVar>> {
    if jobs.is_empty() {
        return vec![base.to_vec()];
    }
    jobs.iter()
        .map(|job| {
            let mut env = base.to_vec();
            env.extend(job.iter().map(|(k, v)| EnvVar::new(k, v)));
            env
        })
        .collect()
}

pub fn git_clone(env: &[EnvVar], source: &Source) -> PipelineTask {
    let mut env = env.to_vec();
    env.push(EnvVar::new("TEKTON_RESOURCE_NAME", GIT_RESOURCE_NAME));

    let step = Step {
        name: GIT_CLONE_TASK.to_string(),
        image: GIT_INIT_IMAGE.to_string(),
        command: vec![
            GIT_INIT_COMMAND.to_string(),
            "-url".to_string(),
            source.repo_url.clone(),
            "-revision".to_string(),
            source.git_ref.clone(),
            "-path".to_string(),
            WORKSPACE_SOURCE_PATH.to_string(),
        ],
        env,
        ..Default::default()
    };

    PipelineTask {
        name: GIT_CLONE_TASK.to_string(),
        workspaces: workspace_bindings(),
        task_spec: Some(task_spec(vec![step])),
        ..Default::default()
    }
}

/// A node running each script line as its own step
pub fn script(
    name: &str,
    run_after: &[String],
    env: &[EnvVar],
    image: &str,
    lines: &[String],
) -> PipelineTask {
    PipelineTask {
        name: name.to_string(),
        run_after: run_after.to_vec(),
        workspaces: workspace_bindings(),
        task_spec: Some(task_spec(script_steps(env, image, lines))),
        ..Default::default()
    }
}

pub fn archiver(
    name: &str,
    run_after: &str,
    env: &[EnvVar],
    config: &Configuration,
    paths: &[String],
) -> PipelineTask {
    let mut args = vec![
        "archive".to_string(),
        "--bucket-url".to_string(),
        config.archive_url.clone(),
    ];
    args.extend(paths.iter().cloned());

    let step = Step {
        name: name.to_string(),
        image: config.archiver_image.clone(),
        args,
        env: env.to_vec(),
        working_dir: WORKSPACE_SOURCE_PATH.to_string(),
        ..Default::default()
    };

    PipelineTask {
        name: name.to_string(),
        run_after: vec![run_after.to_string()],
        workspaces: workspace_bindings(),
        task_spec: Some(task_spec(vec![step])),
        ..Default::default()
    }
}

pub fn script_steps(env: &[EnvVar], image: &str, lines: &[String]) -> Vec<Step> {
    lines
        .iter()
        .map(|line| Step {
            image: image.to_string(),
            command: vec!["sh".to_string()],
            args: vec!["-c".to_string(), line.clone()],
            env: env.to_vec(),
            working_dir: WORKSPACE_SOURCE_PATH.to_string(),
            ..Default::default()
        })
        .collect()
}

pub fn workspace_bindings() -> Vec<WorkspaceTaskBinding> {
    vec![WorkspaceTaskBinding {
        name: WORKSPACE_BINDING.to_string(),
        workspace: WORKSPACE_NAME.to_string(),
    }]
}

pub fn task_spec(steps: Vec<Step>) -> TaskSpec {
    TaskSpec {
        workspaces: vec![WorkspaceDeclaration {
            name: WORKSPACE_BINDING.to_string(),
        }],
        steps,
    }
}
