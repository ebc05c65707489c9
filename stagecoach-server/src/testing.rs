//! In-memory collaborators and payloads shared by the server tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stagecoach_client::{ClientError, Counters};
use stagecoach_core::{Configuration, PipelineRun};

use crate::api::AppState;
use crate::repository::{RunRepository, SourceRepository, VolumeRepository};
use crate::service::{DefinitionService, HookService};

pub const PIPELINE_YAML: &str = r#"
image: golang:latest
before_script:
  - echo before
lint:
  stage: test
  script: ['golint']
unit:
  stage: test
  script: ['go test ./...']
"#;

pub const DEFINITION_YAML: &str = r#"
expression: hook.action == 'opened'
param_bindings:
  - name: COMMIT_SHA
    expression: hook.pull_request.head.sha
pipeline_run_spec:
  pipelineSpec:
    params:
      - name: COMMIT_SHA
        type: string
    tasks:
      - name: echo-commit-sha
        taskSpec:
          steps:
            - name: echo
              image: ubuntu
              script: echo "$(params.COMMIT_SHA)"
"#;

pub const PUSH_HOOK: &str = r#"{
    "ref": "refs/tags/simple-tag",
    "before": "0000000000000000000000000000000000000000",
    "after": "6113728f27ae82c7b1a177c8d03f9e96e0adf246",
    "repository": {
        "name": "Hello-World",
        "full_name": "Codertocat/Hello-World",
        "clone_url": "https://github.com/Codertocat/Hello-World.git"
    },
    "head_commit": {
        "id": "6113728f27ae82c7b1a177c8d03f9e96e0adf246",
        "message": "Update README"
    }
}"#;

pub const PULL_REQUEST_HOOK: &str = r#"{
    "action": "opened",
    "number": 2,
    "pull_request": {
        "number": 2,
        "head": { "ref": "changes", "sha": "ec26c3e57ca3a959ca5aad62de7213c562f8c821" },
        "base": { "ref": "master", "sha": "f95f852bd8fca8fcc58a9a2d6c842781e32a215e" }
    },
    "repository": {
        "name": "Hello-World",
        "full_name": "Codertocat/Hello-World",
        "clone_url": "https://github.com/Codertocat/Hello-World.git"
    }
}"#;

/// A push hook with a custom head commit message
pub fn push_hook(message: &str) -> String {
    let mut hook: serde_json::Value = serde_json::from_str(PUSH_HOOK).unwrap();
    hook["head_commit"]["message"] = serde_json::Value::String(message.to_string());
    hook.to_string()
}

pub fn compiler() -> Configuration {
    Configuration {
        archiver_image: "quay.io/example/archiver".to_string(),
        archive_url: "gs://example/archives".to_string(),
        pipeline_run_prefix: "test-pipelinerun-".to_string(),
        default_service_account: "default".to_string(),
        volume_size: "1Gi".to_string(),
    }
}

pub fn service(source: FakeSource, runs: Arc<FakeRuns>, counters: Arc<Counters>) -> HookService {
    HookService::new(
        compiler(),
        ".tekton_ci.yaml",
        Arc::new(source),
        runs,
        Arc::new(FakeVolumes::default()),
        counters,
    )
}

pub fn definitions(
    source: FakeSource,
    runs: Arc<FakeRuns>,
    counters: Arc<Counters>,
) -> DefinitionService {
    DefinitionService::new(
        ".tekton/pull_request.yaml",
        "test-pipelinerun-",
        Arc::new(source),
        runs,
        counters,
    )
}

/// Handler state whose services share one source and counter set
pub fn app_state(source: FakeSource, counters: Arc<Counters>) -> AppState {
    let source = Arc::new(source);
    AppState {
        hooks: Arc::new(HookService::new(
            compiler(),
            ".tekton_ci.yaml",
            source.clone(),
            Arc::new(FakeRuns::default()),
            Arc::new(FakeVolumes::default()),
            counters.clone(),
        )),
        definitions: Arc::new(DefinitionService::new(
            ".tekton/pull_request.yaml",
            "test-pipelinerun-",
            source,
            Arc::new(FakeRuns::default()),
            counters.clone(),
        )),
        counters,
    }
}

pub enum FakeSource {
    Content(Vec<u8>),
    Missing,
    Failing,
}

impl FakeSource {
    pub fn with(content: &str) -> Self {
        Self::Content(content.as_bytes().to_vec())
    }

    pub fn bytes(content: &[u8]) -> Self {
        Self::Content(content.to_vec())
    }

    pub fn missing() -> Self {
        Self::Missing
    }

    pub fn failing() -> Self {
        Self::Failing
    }
}

#[async_trait]
impl SourceRepository for FakeSource {
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        _git_ref: &str,
    ) -> Result<Vec<u8>, ClientError> {
        match self {
            Self::Content(content) => Ok(content.clone()),
            Self::Missing => Err(ClientError::NotFound(format!("{}/{}", repo, path))),
            Self::Failing => Err(ClientError::api_error(500, "server error")),
        }
    }
}

/// Records created runs, naming them from their generate name
#[derive(Default)]
pub struct FakeRuns {
    created: Mutex<Vec<PipelineRun>>,
}

impl FakeRuns {
    pub fn created(&self) -> Vec<PipelineRun> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunRepository for FakeRuns {
    async fn create_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError> {
        let mut created = self.created.lock().unwrap();
        let mut run = run.clone();
        run.metadata.name = Some(format!(
            "{}{}",
            run.metadata.generate_name.clone().unwrap_or_default(),
            created.len()
        ));
        created.push(run.clone());
        Ok(run)
    }
}

#[derive(Default)]
pub struct FakeVolumes {
    count: AtomicUsize,
    failing: bool,
}

impl FakeVolumes {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VolumeRepository for FakeVolumes {
    async fn create_volume(&self, _size: &str) -> Result<String, ClientError> {
        if self.failing {
            return Err(ClientError::api_error(403, "forbidden"));
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("simple-volume-{}", n))
    }
}
