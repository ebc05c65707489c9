//! Server configuration
//!
//! Connection settings for the source host and the execution engine plus the
//! output settings handed to the compiler.

use stagecoach_core::Configuration;

pub const DEFAULT_PIPELINE_FILENAME: &str = ".tekton_ci.yaml";
pub const DEFAULT_DEFINITION_FILENAME: &str = ".tekton/pull_request.yaml";

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (e.g., "0.0.0.0:8080")
    pub bind_addr: String,

    /// Source host REST base URL
    pub scm_api_url: String,
    pub scm_token: Option<String>,

    /// Execution engine REST base URL
    pub engine_api_url: String,
    pub engine_token: Option<String>,

    /// Namespace runs and volume claims are created in
    pub namespace: String,

    /// Pipeline file fetched from each repository
    pub pipeline_filename: String,

    /// Run definition fetched for the `/pipelinerun` route
    pub definition_filename: String,

    pub archiver_image: String,
    pub archive_url: String,
    pub pipeline_run_prefix: String,
    pub service_account: String,
    pub volume_size: String,
}

impl Config {
    pub fn new(archiver_image: String, archive_url: String) -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            scm_api_url: "https://api.github.com".to_string(),
            scm_token: None,
            engine_api_url: "https://kubernetes.default.svc".to_string(),
            engine_token: None,
            namespace: "default".to_string(),
            pipeline_filename: DEFAULT_PIPELINE_FILENAME.to_string(),
            definition_filename: DEFAULT_DEFINITION_FILENAME.to_string(),
            archiver_image,
            archive_url,
            pipeline_run_prefix: "test-pipelinerun-".to_string(),
            service_account: "default".to_string(),
            volume_size: "1Gi".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ARCHIVER_IMAGE (required)
    /// - ARCHIVE_URL (required)
    /// - STAGECOACH_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - SCM_API_URL, SCM_TOKEN
    /// - ENGINE_API_URL, ENGINE_TOKEN, ENGINE_NAMESPACE
    /// - PIPELINERUN_PREFIX, PIPELINERUN_SERVICE_ACCOUNT, PIPELINERUN_VOLUME_SIZE
    /// - PIPELINE_FILENAME (optional, default: .tekton_ci.yaml)
    /// - DEFINITION_FILENAME (optional, default: .tekton/pull_request.yaml)
    pub fn from_env() -> anyhow::Result<Self> {
        let archiver_image = std::env::var("ARCHIVER_IMAGE")
            .map_err(|_| anyhow::anyhow!("ARCHIVER_IMAGE environment variable not set"))?;

        let archive_url = std::env::var("ARCHIVE_URL")
            .map_err(|_| anyhow::anyhow!("ARCHIVE_URL environment variable not set"))?;

        let mut config = Self::new(archiver_image, archive_url);
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(v) = var("STAGECOACH_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = var("SCM_API_URL") {
            config.scm_api_url = v;
        }
        config.scm_token = var("SCM_TOKEN");
        if let Some(v) = var("ENGINE_API_URL") {
            config.engine_api_url = v;
        }
        config.engine_token = var("ENGINE_TOKEN");
        if let Some(v) = var("ENGINE_NAMESPACE") {
            config.namespace = v;
        }
        if let Some(v) = var("PIPELINE_FILENAME") {
            config.pipeline_filename = v;
        }
        if let Some(v) = var("DEFINITION_FILENAME") {
            config.definition_filename = v;
        }
        if let Some(v) = var("PIPELINERUN_PREFIX") {
            config.pipeline_run_prefix = v;
        }
        if let Some(v) = var("PIPELINERUN_SERVICE_ACCOUNT") {
            config.service_account = v;
        }
        if let Some(v) = var("PIPELINERUN_VOLUME_SIZE") {
            config.volume_size = v;
        }

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("scm_api_url", &self.scm_api_url),
            ("engine_api_url", &self.engine_api_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.archiver_image.is_empty() {
            anyhow::bail!("archiver_image cannot be empty");
        }

        if self.archive_url.is_empty() {
            anyhow::bail!("archive_url cannot be empty");
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        Ok(())
    }

    /// Output settings for the compiler
    pub fn compiler(&self) -> Configuration {
        Configuration {
            archiver_image: self.archiver_image.clone(),
            archive_url: self.archive_url.clone(),
            pipeline_run_prefix: self.pipeline_run_prefix.clone(),
            default_service_account: self.service_account.clone(),
            volume_size: self.volume_size.clone(),
        }
    }
}
