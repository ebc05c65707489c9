//! Stagecoach Server
//!
//! Receives source host webhooks, compiles the repository's pipeline file and
//! submits the result to the execution engine.
//!
//! Architecture:
//! - Configuration: settings from the environment
//! - Repositories: the source host and engine clients behind traits
//! - Services: hook handling (fetch, decode, compile, create) and run
//!   definitions (fetch, filter, bind, create)
//! - API: axum routes for `/pipeline`, `/pipelinerun`, `/health` and `/metrics`

mod api;
mod config;
mod repository;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::Config;
use crate::service::{DefinitionService, HookService};
use stagecoach_client::{Counters, EngineClient, Metrics, ScmClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagecoach_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stagecoach Server...");

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        scm = %config.scm_api_url,
        engine = %config.engine_api_url,
        namespace = %config.namespace,
        "Loaded configuration"
    );

    let counters = Arc::new(Counters::new());
    let metrics: Arc<dyn Metrics> = counters.clone();

    let scm = Arc::new(
        ScmClient::new(config.scm_api_url.clone(), metrics.clone())
            .with_token(config.scm_token.clone()),
    );
    let engine = Arc::new(
        EngineClient::new(
            config.engine_api_url.clone(),
            config.namespace.clone(),
            metrics.clone(),
        )
        .with_token(config.engine_token.clone()),
    );

    let hooks = HookService::new(
        config.compiler(),
        config.pipeline_filename.clone(),
        scm.clone(),
        engine.clone(),
        engine.clone(),
        metrics.clone(),
    );
    let definitions = DefinitionService::new(
        config.definition_filename.clone(),
        config.pipeline_run_prefix.clone(),
        scm,
        engine,
        metrics,
    );

    let app = api::create_router(AppState {
        hooks: Arc::new(hooks),
        definitions: Arc::new(definitions),
        counters,
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
