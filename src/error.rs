//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Forbidden(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Store errors; conflicts are 409, everything else 500
    #[error(transparent)]
    Store(StoreError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid-request"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Domain(domain_err) => {
                let status = match domain_err {
                    e if e.is_conflict_error() => StatusCode::CONFLICT,
                    DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::AccessDenied(_) => StatusCode::UNAUTHORIZED,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, domain_err.code())
            }
            AppError::Store(StoreError::NotFound(e)) => (StatusCode::NOT_FOUND, e.code()),
            AppError::Store(e) if e.is_conflict() => (StatusCode::CONFLICT, "conflict"),
            AppError::Store(_) | AppError::Internal(_) | AppError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal-error")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            // a missing referenced record reads the same from any layer
            StoreError::NotFound(domain_err) => AppError::Domain(domain_err),
            other => AppError::Store(other),
        }
    }
}

// Extractor rejections become `invalid-request` with the same body shape
// as every other error.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let error_message = match &self {
            AppError::Store(StoreError::Conflict(msg)) => msg.clone(),
            AppError::Store(StoreError::NotFound(e)) => e.to_string(),
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error_code: error_code.to_string(),
            error_message,
        };

        (status, Json(body)).into_response()
    }
}
