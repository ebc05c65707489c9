//! API Module
//!
//! HTTP layer for the webhook service.

pub mod error;
pub mod health;
pub mod hook;
pub mod metrics;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use stagecoach_client::Counters;
use tower_http::trace::TraceLayer;

use crate::service::{DefinitionService, HookService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub hooks: Arc<HookService>,
    pub definitions: Arc<DefinitionService>,
    pub counters: Arc<Counters>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::render_metrics))
        .route("/pipeline", post(hook::handle_pipeline))
        .route("/pipelinerun", post(hook::handle_pipelinerun))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
