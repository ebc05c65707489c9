//! Execution engine client

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stagecoach_core::PipelineRun;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::metrics::Metrics;
use crate::handle_response;

const PIPELINE_RUNS_PATH: &str = "apis/tekton.dev/v1";
const VOLUME_NAME_PREFIX: &str = "simple-volume-";

/// Client for Tekton `PipelineRun`s and workspace volume claims
#[derive(Clone)]
pub struct EngineClient {
    base_url: String,
    namespace: String,
    token: Option<String>,
    client: Client,
    metrics: Arc<dyn Metrics>,
}

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    items: Vec<PipelineRun>,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    metadata: CreatedMeta,
}

#[derive(Debug, Deserialize)]
struct CreatedMeta {
    name: String,
}

impl EngineClient {
    pub fn new(
        base_url: impl Into<String>,
        namespace: impl Into<String>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self::with_client(base_url, namespace, metrics, Client::new())
    }

    /// Creates a client with a configured reqwest client (timeouts, TLS roots)
    pub fn with_client(
        base_url: impl Into<String>,
        namespace: impl Into<String>,
        metrics: Arc<dyn Metrics>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            token: None,
            client,
            metrics,
        }
    }

    /// Sends a bearer token with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn runs_url(&self) -> String {
        format!(
            "{}/{}/namespaces/{}/pipelineruns",
            self.base_url, PIPELINE_RUNS_PATH, self.namespace
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn record<T>(&self, name: &str, result: Result<T>) -> Result<T> {
        self.metrics.count_api_call(name);
        if result.is_err() {
            self.metrics.count_failed_api_call(name);
        }
        result
    }

    /// Sends an authorized request and decodes the JSON response
    async fn send<T: DeserializeOwned>(&self, name: &str, request: RequestBuilder) -> Result<T> {
        let result = match self.authorize(request).send().await {
            Ok(response) => handle_response(response).await,
            Err(e) => Err(e.into()),
        };
        self.record(name, result)
    }

    /// Submits a run and returns it as created by the engine
    pub async fn create_run(&self, run: &PipelineRun) -> Result<PipelineRun> {
        let request = self.client.post(self.runs_url()).json(run);
        self.send("create_pipelinerun", request).await
    }

    /// Lists the runs matching a label selector
    pub async fn list_runs(&self, label_selector: &str) -> Result<Vec<PipelineRun>> {
        let request = self
            .client
            .get(self.runs_url())
            .query(&[("labelSelector", label_selector)]);
        let list: RunList = self.send("list_pipelineruns", request).await?;
        Ok(list.items)
    }

    /// Replaces a run, typically to persist annotation changes
    pub async fn update_run(&self, run: &PipelineRun) -> Result<PipelineRun> {
        let Some(name) = run.metadata.name.as_deref() else {
            return Err(ClientError::InvalidRequest(
                "cannot update a run without a name".to_string(),
            ));
        };
        let url = format!("{}/{}", self.runs_url(), name);
        self.send("update_pipelinerun", self.client.put(&url).json(run))
            .await
    }

    /// Creates a read-write-many volume claim and returns its name
    pub async fn create_volume(&self, size: &str) -> Result<String> {
        let claim = serde_json::json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {
                "generateName": VOLUME_NAME_PREFIX,
                "namespace": self.namespace,
            },
            "spec": {
                "accessModes": ["ReadWriteMany"],
                "volumeMode": "Filesystem",
                "resources": { "requests": { "storage": size } },
            },
        });

        let url = format!(
            "{}/api/v1/namespaces/{}/persistentvolumeclaims",
            self.base_url, self.namespace
        );
        let created: CreatedObject = self
            .send("create_volume", self.client.post(&url).json(&claim))
            .await?;

        debug!(claim = %created.metadata.name, size, "created volume claim");
        Ok(created.metadata.name)
    }
}
