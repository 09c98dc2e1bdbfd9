//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::StoreError;
use crate::service::registry_service::RegistryError;
use crate::service::task_service::TaskError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    StoreError(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        if status.is_client_error() {
            tracing::debug!("Rejected request ({}): {}", status, message);
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreError(err)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_)
            | RegistryError::VersionNotFound { .. }
            | RegistryError::NoCurrentVersion(_) => ApiError::NotFound(err.to_string()),
            RegistryError::Conflict(_) | RegistryError::Duplicate { .. } => {
                ApiError::Conflict(err.to_string())
            }
            RegistryError::ValidationError(msg) => ApiError::BadRequest(msg),
            RegistryError::Store(err) => ApiError::StoreError(err),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::UnknownPipeline(msg) | TaskError::NotFound(msg) => ApiError::NotFound(msg),
            TaskError::DuplicateTask { .. } => ApiError::Conflict(err.to_string()),
            TaskError::PipelineConflict(msg) => ApiError::Conflict(msg),
            TaskError::InvalidInput(msg) | TaskError::InvalidState(msg) => {
                ApiError::BadRequest(msg)
            }
            TaskError::Store(err) => ApiError::StoreError(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
