// Common types and utilities for API handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::errors::{SchedulerError, StoreError};

// Helper type for API responses
pub type ApiResult<T> = Result<T, ApiError>;

/// Error response rendered as `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::TaskNotFound { .. } => Self::not_found("Task not found"),
            SchedulerError::Store(StoreError::NotFound { entity, .. }) => {
                Self::not_found(format!("{} not found", entity))
            }
            SchedulerError::Validation { .. } | SchedulerError::InvalidSchedule { .. } => {
                Self::unprocessable(err.to_string())
            }
            SchedulerError::ConcurrencyRejected { .. } => {
                Self::new(StatusCode::CONFLICT, "Task is already running")
            }
            SchedulerError::SchedulerUnavailable => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
