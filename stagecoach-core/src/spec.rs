//! Pipeline run definitions
//!
//! A definition file embeds a ready-made run spec next to an optional filter
//! expression and a list of parameter bindings:
//!
//! ```yaml
//! expression: hook.action == 'opened'
//! param_bindings:
//!   - name: COMMIT_SHA
//!     expression: hook.pull_request.head.sha
//! pipeline_run_spec:
//!   pipelineSpec:
//!     tasks: [...]
//! ```
//!
//! When the filter passes, every binding is evaluated into a run parameter
//! and the run spec is submitted as is.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::compiler::Source;
use crate::domain::run::{
    HOOK_ID_ANNOTATION, Param, PipelineRun, PipelineRunSpec, SOURCE_REF_ANNOTATION,
    SOURCE_URL_ANNOTATION,
};
use crate::expr::{ExprError, ExpressionContext, Value};

/// Value of the managed-by label on runs created from definitions
pub const MANAGED_BY: &str = "pipelineRun";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to decode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("expression '{expression}' must return a bool, got {kind}")]
    FilterNotBool { expression: String, kind: String },
}

/// Names a run parameter and the expression producing its value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParamBinding {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineDefinition {
    /// Must evaluate true for a run to be created; empty always passes
    #[serde(rename = "expression")]
    pub filter: String,
    pub param_bindings: Vec<ParamBinding>,
    pub pipeline_run_spec: PipelineRunSpec,
}

/// Decodes a definition document
pub fn parse(input: &str) -> Result<PipelineDefinition, SpecError> {
    let definition: Option<PipelineDefinition> = serde_yaml::from_str(input)?;
    Ok(definition.unwrap_or_default())
}

/// Builds the run a definition describes for one event
///
/// Returns `Ok(None)` when the filter evaluates false. Bound parameters are
/// appended after any the run spec already carries.
pub fn execute(
    definition: PipelineDefinition,
    context: &ExpressionContext,
    generate_name: &str,
    source: &Source,
    hook_id: &str,
) -> Result<Option<PipelineRun>, SpecError> {
    if !definition.filter.is_empty() {
        match context.evaluate(&definition.filter)? {
            Value::Bool(true) => {}
            Value::Bool(false) => {
                info!(filter = %definition.filter, "filter did not match");
                return Ok(None);
            }
            other => {
                return Err(SpecError::FilterNotBool {
                    expression: definition.filter,
                    kind: other.kind().to_string(),
                });
            }
        }
    }

    let mut spec = definition.pipeline_run_spec;
    for binding in &definition.param_bindings {
        let value = context.evaluate_to_string(&binding.expression)?;
        debug!(param = %binding.name, value = %value, "bound parameter");
        spec.params.push(Param {
            name: binding.name.clone(),
            value,
        });
    }

    let mut run = PipelineRun::new(MANAGED_BY, generate_name, spec);
    run.set_annotation(SOURCE_URL_ANNOTATION, source.repo_url.as_str());
    run.set_annotation(SOURCE_REF_ANNOTATION, source.git_ref.as_str());
    run.set_annotation(HOOK_ID_ANNOTATION, hook_id);
    Ok(Some(run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run::MANAGED_BY_LABEL;
    use crate::hook::Hook;
    use crate::hook::fixtures::{PULL_REQUEST, PUSH};

    const DEFINITION: &str = r#"
expression: hook.action == 'opened'
param_bindings:
  - name: COMMIT_SHA
    expression: hook.pull_request.head.sha
pipeline_run_spec:
  pipelineSpec:
    params:
      - name: COMMIT_SHA
        type: string
        description: the SHA for the pull_request
    tasks:
      - name: echo-commit-sha
        taskSpec:
          steps:
            - name: echo
              image: ubuntu
              script: |
                #!/usr/bin/env bash
                echo "$(params.COMMIT_SHA)"
"#;

    fn context(kind: &str, body: &str) -> ExpressionContext {
        ExpressionContext::new(&Hook::parse(kind, body.as_bytes()).unwrap()).unwrap()
    }

    fn source() -> Source {
        Source {
            repo_url: "https://github.com/Codertocat/Hello-World.git".to_string(),
            git_ref: "ec26c3e57ca3a959ca5aad62de7213c562f8c821".to_string(),
        }
    }

    #[test]
    fn test_parse_definition() {
        let definition = parse(DEFINITION).unwrap();

        assert_eq!(definition.filter, "hook.action == 'opened'");
        assert_eq!(
            definition.param_bindings,
            vec![ParamBinding {
                name: "COMMIT_SHA".to_string(),
                expression: "hook.pull_request.head.sha".to_string(),
            }]
        );
        let pipeline = &definition.pipeline_run_spec.pipeline_spec;
        assert_eq!(pipeline.params[0].param_type, "string");
        let step = &pipeline.tasks[0].task_spec.as_ref().unwrap().steps[0];
        assert_eq!(step.image, "ubuntu");
        assert!(step.script.contains("$(params.COMMIT_SHA)"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert_eq!(parse("").unwrap(), PipelineDefinition::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = parse("param_bindings: [unclosed").unwrap_err();
        assert!(matches!(err, SpecError::Yaml(_)));
    }

    #[test]
    fn test_execute_binds_params() {
        let run = execute(
            parse(DEFINITION).unwrap(),
            &context("pull_request", PULL_REQUEST),
            "new-pipeline-run-",
            &source(),
            "hook-1",
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            run.spec.params,
            vec![Param {
                name: "COMMIT_SHA".to_string(),
                value: "ec26c3e57ca3a959ca5aad62de7213c562f8c821".to_string(),
            }]
        );
        assert_eq!(run.metadata.generate_name.as_deref(), Some("new-pipeline-run-"));
        assert_eq!(
            run.metadata.labels.get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY)
        );
        assert_eq!(run.annotation(HOOK_ID_ANNOTATION), Some("hook-1"));
        assert_eq!(
            run.annotation(SOURCE_REF_ANNOTATION),
            Some("ec26c3e57ca3a959ca5aad62de7213c562f8c821")
        );
        assert_eq!(run.spec.pipeline_spec.tasks[0].name, "echo-commit-sha");
    }

    #[test]
    fn test_execute_appends_to_existing_params() {
        let mut definition = parse(DEFINITION).unwrap();
        definition.filter.clear();
        definition.pipeline_run_spec.params.push(Param {
            name: "STATIC".to_string(),
            value: "fixed".to_string(),
        });

        let run = execute(
            definition,
            &context("pull_request", PULL_REQUEST),
            "run-",
            &source(),
            "hook-1",
        )
        .unwrap()
        .unwrap();

        let names: Vec<&str> = run.spec.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["STATIC", "COMMIT_SHA"]);
    }

    #[test]
    fn test_filter_false_creates_nothing() {
        let mut definition = parse(DEFINITION).unwrap();
        definition.filter = "hook.action == 'closed'".to_string();

        let result = execute(
            definition,
            &context("pull_request", PULL_REQUEST),
            "run-",
            &source(),
            "hook-1",
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_filter_passes() {
        let definition = PipelineDefinition::default();
        let run = execute(definition, &context("push", PUSH), "run-", &source(), "hook-1").unwrap();
        assert!(run.is_some());
    }

    #[test]
    fn test_filter_must_be_bool() {
        let mut definition = parse(DEFINITION).unwrap();
        definition.filter = "hook.action".to_string();

        let err = execute(
            definition,
            &context("pull_request", PULL_REQUEST),
            "run-",
            &source(),
            "hook-1",
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::FilterNotBool { ref kind, .. } if kind == "string"));
    }

    #[test]
    fn test_filter_error_is_reported() {
        let definition = PipelineDefinition {
            filter: "hook.missing == 'x'".to_string(),
            ..Default::default()
        };

        let err = execute(definition, &context("push", PUSH), "run-", &source(), "hook-1")
            .unwrap_err();
        assert!(matches!(err, SpecError::Expression(ExprError::NoSuchKey { .. })));
    }

    #[test]
    fn test_binding_must_produce_text() {
        let definition = PipelineDefinition {
            param_bindings: vec![ParamBinding {
                name: "PR".to_string(),
                expression: "hook.pull_request".to_string(),
            }],
            ..Default::default()
        };

        let err = execute(
            definition,
            &context("pull_request", PULL_REQUEST),
            "run-",
            &source(),
            "hook-1",
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::Expression(ExprError::NotAString { .. })));
    }
}
