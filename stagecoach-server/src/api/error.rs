//! API Error Handling
//!
//! Every failure is reported as a 500 carrying the error text.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{DefinitionServiceError, HookServiceError};

#[derive(Debug)]
pub enum ApiError {
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<HookServiceError> for ApiError {
    fn from(err: HookServiceError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<DefinitionServiceError> for ApiError {
    fn from(err: DefinitionServiceError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
