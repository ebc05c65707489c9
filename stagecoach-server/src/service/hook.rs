//! Hook Service
//!
//! Turns an incoming push hook into a created pipeline run:
//! fetch the pipeline file at the pushed commit, decode it, allocate a shared
//! workspace, compile and submit.

use std::string::FromUtf8Error;
use std::sync::Arc;

use stagecoach_client::{ClientError, Metrics};
use stagecoach_core::dsl::{self, DslError};
use stagecoach_core::hook::{Hook, HookError, PushHook};
use stagecoach_core::{
    CompileError, Configuration, ExprError, ExpressionContext, PipelineRun, Source, compile,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::repository::{RunRepository, SourceRepository, VolumeRepository};

/// Commit message markers that suppress a build
const SKIP_MARKERS: [&str; 2] = ["[ci skip]", "[skip ci]"];

#[derive(Debug, Error)]
pub enum HookServiceError {
    #[error(transparent)]
    InvalidHook(#[from] HookError),

    #[error("error fetching pipeline file: {0}")]
    Fetch(#[source] ClientError),

    #[error(transparent)]
    Context(#[from] ExprError),

    #[error("pipeline file is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),

    #[error("error parsing pipeline definition: {0}")]
    Definition(#[from] DslError),

    #[error("error creating volume: {0}")]
    Volume(#[source] ClientError),

    #[error("error converting pipeline to pipelinerun: {0}")]
    Compile(#[from] CompileError),

    #[error("error creating pipelinerun: {0}")]
    CreateRun(#[source] ClientError),
}

pub type Result<T> = std::result::Result<T, HookServiceError>;

pub struct HookService {
    compiler: Configuration,
    pipeline_filename: String,
    source: Arc<dyn SourceRepository>,
    runs: Arc<dyn RunRepository>,
    volumes: Arc<dyn VolumeRepository>,
    metrics: Arc<dyn Metrics>,
}

impl HookService {
    pub fn new(
        compiler: Configuration,
        pipeline_filename: impl Into<String>,
        source: Arc<dyn SourceRepository>,
        runs: Arc<dyn RunRepository>,
        volumes: Arc<dyn VolumeRepository>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self {
            compiler,
            pipeline_filename: pipeline_filename.into(),
            source,
            runs,
            volumes,
            metrics,
        }
    }

    /// Handles one delivery
    ///
    /// `kind` and `delivery_id` come from the event and delivery headers.
    /// Returns the created run, or `None` when there was nothing to build.
    pub async fn handle(
        &self,
        kind: &str,
        delivery_id: &str,
        body: &[u8],
    ) -> Result<Option<PipelineRun>> {
        let hook = match Hook::parse(kind, body) {
            Ok(hook) => hook,
            Err(e) => {
                error!("error parsing webhook: {}", e);
                self.metrics.count_invalid_hook();
                return Err(e.into());
            }
        };

        self.metrics.count_hook(hook.kind());

        match &hook {
            Hook::Push(push) => self.push(&hook, push, delivery_id).await,
            other => {
                debug!(kind = other.kind(), "ignoring hook");
                Ok(None)
            }
        }
    }

    async fn push(
        &self,
        hook: &Hook,
        push: &PushHook,
        delivery_id: &str,
    ) -> Result<Option<PipelineRun>> {
        let repo = hook.repo_full_name();
        let sha = hook.commit_sha();
        info!(repo, sha, "processing push event");

        let content = match self
            .source
            .file_contents(repo, &self.pipeline_filename, sha)
            .await
        {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                info!(repo, "no pipeline definition found");
                return Ok(None);
            }
            Err(e) => return Err(HookServiceError::Fetch(e)),
        };

        if skip(push) {
            info!(repo, sha, "skipping pipeline conversion");
            return Ok(None);
        }

        let context = ExpressionContext::new(hook)?;
        let pipeline = dsl::parse(&String::from_utf8(content)?)?;

        let claim = self
            .volumes
            .create_volume(&self.compiler.volume_size)
            .await
            .map_err(HookServiceError::Volume)?;

        let source = Source {
            repo_url: hook.clone_url().to_string(),
            git_ref: sha.to_string(),
        };
        let run = compile(
            &pipeline,
            &self.compiler,
            &source,
            &claim,
            Some(&context),
            delivery_id,
        )?;

        let created = self
            .runs
            .create_run(&run)
            .await
            .map_err(HookServiceError::CreateRun)?;

        info!(repo, sha, run = created.display_name(), "created pipelinerun");
        Ok(Some(created))
    }
}

fn skip(push: &PushHook) -> bool {
    let message = push.commit_message();
    SKIP_MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeRuns, FakeSource, FakeVolumes, PIPELINE_YAML, PULL_REQUEST_HOOK, PUSH_HOOK, push_hook,
        service,
    };
    use stagecoach_client::Counters;
    use stagecoach_client::metrics::{HOOKS_INVALID, HOOKS_TOTAL};
    use stagecoach_core::domain::run::{HOOK_ID_ANNOTATION, SOURCE_REF_ANNOTATION};

    #[tokio::test]
    async fn test_push_creates_run() {
        let runs = Arc::new(FakeRuns::default());
        let counters = Arc::new(Counters::new());
        let svc = service(FakeSource::with(PIPELINE_YAML), runs.clone(), counters.clone());

        let created = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.metadata.name.as_deref(), Some("test-pipelinerun-0"));
        assert_eq!(
            created.annotation(SOURCE_REF_ANNOTATION),
            Some("6113728f27ae82c7b1a177c8d03f9e96e0adf246")
        );
        assert_eq!(created.annotation(HOOK_ID_ANNOTATION), Some("delivery-1"));
        assert_eq!(
            created.spec.workspaces[0].persistent_volume_claim.claim_name,
            "simple-volume-0"
        );
        assert_eq!(runs.created().len(), 1);
        assert_eq!(counters.get(HOOKS_TOTAL, "push"), 1);
    }

    #[tokio::test]
    async fn test_pull_request_is_counted_and_ignored() {
        let runs = Arc::new(FakeRuns::default());
        let counters = Arc::new(Counters::new());
        let svc = service(FakeSource::with(PIPELINE_YAML), runs.clone(), counters.clone());

        let result = svc
            .handle("pull_request", "delivery-1", PULL_REQUEST_HOOK.as_bytes())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(runs.created().is_empty());
        assert_eq!(counters.get(HOOKS_TOTAL, "pull_request"), 1);
    }

    #[tokio::test]
    async fn test_missing_pipeline_file() {
        let runs = Arc::new(FakeRuns::default());
        let svc = service(FakeSource::missing(), runs.clone(), Arc::new(Counters::new()));

        let result = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(runs.created().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let svc = service(
            FakeSource::failing(),
            Arc::new(FakeRuns::default()),
            Arc::new(Counters::new()),
        );

        let err = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, HookServiceError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_skip_markers() {
        for message in ["fix typo [ci skip]", "[skip ci] docs only"] {
            let runs = Arc::new(FakeRuns::default());
            let svc = service(FakeSource::with(PIPELINE_YAML), runs.clone(), Arc::new(Counters::new()));

            let result = svc
                .handle("push", "delivery-1", push_hook(message).as_bytes())
                .await
                .unwrap();

            assert!(result.is_none(), "message {:?}", message);
            assert!(runs.created().is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_hook() {
        let counters = Arc::new(Counters::new());
        let svc = service(
            FakeSource::with(PIPELINE_YAML),
            Arc::new(FakeRuns::default()),
            counters.clone(),
        );

        let err = svc.handle("push", "delivery-1", b"not json").await.unwrap_err();

        assert!(matches!(err, HookServiceError::InvalidHook(_)));
        assert_eq!(counters.get(HOOKS_INVALID, ""), 1);
    }

    #[tokio::test]
    async fn test_invalid_pipeline_definition() {
        let svc = service(
            FakeSource::with("format:\n  stage: test\n"),
            Arc::new(FakeRuns::default()),
            Arc::new(Counters::new()),
        );

        let err = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, HookServiceError::Definition(_)));
    }

    #[tokio::test]
    async fn test_rules_remove_every_task() {
        let yaml = r#"
format:
  stage: test
  script: ['go fmt']
  rules:
    - if: vars.CI_COMMIT_BRANCH == 'simple-tag'
      when: never
"#;
        let runs = Arc::new(FakeRuns::default());
        let svc = service(FakeSource::with(yaml), runs.clone(), Arc::new(Counters::new()));

        let created = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap()
            .unwrap();

        let names: Vec<&str> = created
            .spec
            .pipeline_spec
            .tasks
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["git-clone"]);
        assert_eq!(runs.created().len(), 1);
    }

    #[tokio::test]
    async fn test_scripts_only_pipeline_creates_run() {
        let yaml = "before_script:\n  - echo before\nafter_script:\n  - echo after\n";
        let runs = Arc::new(FakeRuns::default());
        let svc = service(FakeSource::with(yaml), runs.clone(), Arc::new(Counters::new()));

        let created = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.spec.pipeline_spec.tasks.len(), 3);
        assert_eq!(runs.created().len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_file_not_utf8() {
        let runs = Arc::new(FakeRuns::default());
        let svc = service(
            FakeSource::bytes(b"image: \xff\xfe\n"),
            runs.clone(),
            Arc::new(Counters::new()),
        );

        let err = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(err, HookServiceError::Encoding(_)));
        assert!(runs.created().is_empty());
    }

    #[tokio::test]
    async fn test_bad_rule_expression() {
        let yaml = r#"
format:
  script: ['go fmt']
  rules:
    - if: hook.missing == 'x'
      when: never
"#;
        let svc = service(
            FakeSource::with(yaml),
            Arc::new(FakeRuns::default()),
            Arc::new(Counters::new()),
        );

        let err = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, HookServiceError::Compile(_)));
        assert!(err.to_string().contains("no such key: missing"));
    }

    #[tokio::test]
    async fn test_volume_failure() {
        let svc = HookService::new(
            Configuration::default(),
            ".tekton_ci.yaml",
            Arc::new(FakeSource::with(PIPELINE_YAML)),
            Arc::new(FakeRuns::default()),
            Arc::new(FakeVolumes::failing()),
            Arc::new(Counters::new()),
        );

        let err = svc
            .handle("push", "delivery-1", PUSH_HOOK.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, HookServiceError::Volume(_)));
    }
}
