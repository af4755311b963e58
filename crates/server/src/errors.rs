use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use service::auth::errors::AuthError;
use service::errors::ServiceError;

/// JSON API error with a DRF-shaped body: `{"detail": "..."}` for general
/// failures, `{"<field>": ["..."]}` for field-level validation.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, body: serde_json::json!({ "detail": detail.into() }) }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: serde_json::json!({ field: [message.into()] }),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found.")
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        error!(error = %detail, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "A server error occurred.")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation { field, message } => Self::validation(&field, message),
            ServiceError::NotFound(_) => Self::not_found(),
            ServiceError::Storage(msg) | ServiceError::Db(msg) => Self::internal(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation { field, message } => Self::validation(&field, message),
            // Uniqueness surfaces as a field error, same as a storage-level violation
            AuthError::Conflict => {
                Self::validation("email", "A user with that email already exists.")
            }
            AuthError::NotFound => Self::not_found(),
            AuthError::Unauthorized => {
                Self::unauthorized("No active account found with the given credentials")
            }
            AuthError::TokenError(_) => Self::unauthorized("Token is invalid or expired"),
            AuthError::HashError(msg) | AuthError::Repository(msg) => Self::internal(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
