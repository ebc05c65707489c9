//! Stagecoach Watcher
//!
//! Follows the pipeline runs this service created and reports each state
//! change back to the source host as a commit status.
//!
//! Architecture:
//! - Configuration: settings from the environment or defaults
//! - Repositories: the engine and source host clients behind traits
//! - Watch: a polling subscription feeding the run watcher
//!
//! Runs until interrupted.

mod config;
mod repository;
mod watch;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::watch::RunWatcher;
use stagecoach_client::{Counters, EngineClient, Metrics, ScmClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagecoach_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stagecoach Watcher");

    let config = load_config()?;
    info!(
        engine = %config.engine_api_url,
        scm = %config.scm_api_url,
        namespace = %config.namespace,
        "Loaded configuration"
    );

    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let metrics: Arc<dyn Metrics> = Arc::new(Counters::new());
    let engine = EngineClient::with_client(
        config.engine_api_url.clone(),
        config.namespace.clone(),
        metrics.clone(),
        http.clone(),
    )
    .with_token(config.engine_token.clone());
    let scm = ScmClient::with_client(config.scm_api_url.clone(), metrics, http)
        .with_token(config.scm_token.clone());

    let watcher = RunWatcher::new(
        Arc::new(engine),
        Arc::new(scm),
        config.poll_interval,
        config.notify_timeout,
    );

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        let _ = stop_tx.send(true);
    });

    watcher.run(stop_rx).await;

    info!("Watcher stopped");
    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
