//! In-memory collaborators for tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use stagecoach_client::ClientError;
use stagecoach_core::PipelineRun;
use stagecoach_core::domain::run::{
    CONDITION_SUCCEEDED, Condition, NOTIFICATION_STATE_ANNOTATION, RunStatus,
    SOURCE_REF_ANNOTATION, SOURCE_URL_ANNOTATION,
};
use stagecoach_core::domain::status::StatusInput;

use crate::repository::{RunStore, StatusNotifier};

pub const CLONE_URL: &str = "https://github.com/Codertocat/Hello-World.git";
pub const COMMIT_SHA: &str = "6113728f27ae82c7b1a177c8d03f9e96e0adf246";

/// A run carrying the source annotations and a `Succeeded` condition
pub fn run_with(name: &str, condition_status: &str, memo: Option<&str>) -> PipelineRun {
    let mut run = PipelineRun::new("test", "test-", Default::default());
    run.metadata.name = Some(name.to_string());
    run.status = Some(RunStatus {
        conditions: vec![Condition {
            condition_type: CONDITION_SUCCEEDED.to_string(),
            status: condition_status.to_string(),
            reason: None,
        }],
    });
    run.set_annotation(SOURCE_URL_ANNOTATION, CLONE_URL);
    run.set_annotation(SOURCE_REF_ANNOTATION, COMMIT_SHA);
    if let Some(memo) = memo {
        run.set_annotation(NOTIFICATION_STATE_ANNOTATION, memo);
    }
    run
}

#[derive(Default)]
pub struct FakeRunStore {
    runs: Mutex<Vec<PipelineRun>>,
    updated: Mutex<Vec<PipelineRun>>,
    fail_list: AtomicBool,
    list_calls: AtomicUsize,
}

impl FakeRunStore {
    pub fn with(runs: Vec<PipelineRun>) -> Self {
        Self {
            runs: Mutex::new(runs),
            ..Default::default()
        }
    }

    pub fn fail_next_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        self.runs.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<PipelineRun> {
        self.updated.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunStore for FakeRunStore {
    async fn list_runs(&self) -> Result<Vec<PipelineRun>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.swap(false, Ordering::SeqCst) {
            return Err(ClientError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.runs())
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<PipelineRun, ClientError> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(existing) = runs
            .iter_mut()
            .find(|r| r.metadata.name == run.metadata.name)
        {
            *existing = run.clone();
        }
        self.updated.lock().unwrap().push(run.clone());
        Ok(run.clone())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(String, String, StatusInput)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String, StatusInput)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusNotifier for FakeNotifier {
    async fn notify(&self, repo: &str, sha: &str, status: &StatusInput) -> Result<(), ClientError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ClientError::ApiError {
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((repo.to_string(), sha.to_string(), status.clone()));
        Ok(())
    }
}
