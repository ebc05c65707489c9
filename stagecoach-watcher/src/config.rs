//! Watcher configuration
//!
//! Connection settings for the engine and source host plus the polling and
//! notification timing.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Execution engine REST base URL
    pub engine_api_url: String,
    pub engine_token: Option<String>,

    /// Namespace the watched runs live in
    pub namespace: String,

    /// Source host REST base URL
    pub scm_api_url: String,
    pub scm_token: Option<String>,

    /// How often the engine is asked for run updates
    pub poll_interval: Duration,

    /// Upper bound on a single status notification
    pub notify_timeout: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ENGINE_API_URL (optional, default: https://kubernetes.default.svc)
    /// - ENGINE_TOKEN (optional)
    /// - ENGINE_NAMESPACE (optional, default: default)
    /// - SCM_API_URL (optional, default: https://api.github.com)
    /// - SCM_TOKEN (optional)
    /// - WATCH_POLL_INTERVAL (optional, seconds, default: 5)
    /// - NOTIFY_TIMEOUT (optional, seconds, default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let seconds = |name: &str, default: Duration| -> anyhow::Result<Duration> {
            match var(name) {
                Some(v) => v
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got {:?}", name, v)),
                None => Ok(default),
            }
        };

        Ok(Self {
            engine_api_url: var("ENGINE_API_URL").unwrap_or(defaults.engine_api_url),
            engine_token: var("ENGINE_TOKEN"),
            namespace: var("ENGINE_NAMESPACE").unwrap_or(defaults.namespace),
            scm_api_url: var("SCM_API_URL").unwrap_or(defaults.scm_api_url),
            scm_token: var("SCM_TOKEN"),
            poll_interval: seconds("WATCH_POLL_INTERVAL", defaults.poll_interval)?,
            notify_timeout: seconds("NOTIFY_TIMEOUT", defaults.notify_timeout)?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("engine_api_url", &self.engine_api_url),
            ("scm_api_url", &self.scm_api_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.notify_timeout.is_zero() {
            anyhow::bail!("notify_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_api_url: "https://kubernetes.default.svc".to_string(),
            engine_token: None,
            namespace: "default".to_string(),
            scm_api_url: "https://api.github.com".to_string(),
            scm_token: None,
            poll_interval: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(30),
        }
    }
}
