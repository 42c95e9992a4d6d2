//! Application error types.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use passage_core::auth::{AuthError, TokenError};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed; `code` tells the client why.
    #[error("Unauthorized: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code: "unauthorized",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, *code, message.as_str())
            }
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Upstream(m) => (StatusCode::BAD_GATEWAY, "upstream_error", m.as_str()),
            AppError::StorageUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", m.as_str())
            }
            AppError::Internal(m) => {
                error!(detail = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

/// Machine-readable code for a token failure.
fn token_code(e: &TokenError) -> &'static str {
    match e.cause() {
        TokenError::Expired => "token_expired",
        TokenError::NotYetValid => "token_not_yet_valid",
        TokenError::InvalidSignature => "invalid_signature",
        TokenError::Revoked => "token_revoked",
        TokenError::InvalidRefreshToken => "invalid_refresh_token",
        _ => "invalid_token",
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Claims(e) => AppError::Validation(e.to_string()),
            AuthError::InvalidProfile(msg) => AppError::Validation(msg),
            AuthError::Upstream(e) => AppError::Upstream(e.to_string()),
            AuthError::UserNotFound(id) => AppError::NotFound(format!("User {id} not found")),
            AuthError::Storage(e) => AppError::StorageUnavailable(e.to_string()),
            AuthError::Token(e) => match e.cause() {
                TokenError::Store(_) => AppError::StorageUnavailable(e.to_string()),
                TokenError::Encode(_) => AppError::Internal(e.to_string()),
                _ => AppError::Unauthorized {
                    code: token_code(&e),
                    message: e.to_string(),
                },
            },
        }
    }
}
