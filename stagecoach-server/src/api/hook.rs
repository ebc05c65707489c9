//! Pipeline Hook API Handler

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// Header naming the event kind
pub const EVENT_HEADER: &str = "x-github-event";
/// Header carrying the unique delivery id
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// POST /pipeline
///
/// Responds with the created run, or an empty 200 when there was nothing to
/// build.
pub async fn handle_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let kind = header_value(&headers, EVENT_HEADER);
    let delivery_id = header_value(&headers, DELIVERY_HEADER);
    tracing::debug!(kind, delivery_id, "received hook");

    let response = match state.hooks.handle(kind, delivery_id, &body).await? {
        Some(run) => Json(run).into_response(),
        None => StatusCode::OK.into_response(),
    };
    Ok(response)
}

/// POST /pipelinerun
///
/// Creates the run described by the repository's run definition. Responds
/// with an empty 200 when there is no definition or its filter did not match.
pub async fn handle_pipelinerun(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let kind = header_value(&headers, EVENT_HEADER);
    let delivery_id = header_value(&headers, DELIVERY_HEADER);
    tracing::debug!(kind, delivery_id, "received definition hook");

    let response = match state.definitions.handle(kind, delivery_id, &body).await? {
        Some(run) => Json(run).into_response(),
        None => StatusCode::OK.into_response(),
    };
    Ok(response)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
