//! Metrics API Handler

use axum::{extract::State, http::header, response::IntoResponse};

use crate::api::AppState;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// GET /metrics
/// Counters in Prometheus text format
pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.counters.render())
}
