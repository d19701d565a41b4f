// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! Policy denials are NOT errors: `can_use` returning a deny reason is a
//! normal 200 response shaped as an upgrade prompt. Errors here are the
//! infrastructure and auth failures around it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Account blocked")]
    AccountBlocked,

    #[error("Admin access required")]
    AdminRequired,

    #[error("App configuration not available")]
    ConfigUnavailable,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Generation API error: {0}")]
    GenerationApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::AccountBlocked => (
                StatusCode::FORBIDDEN,
                "account_blocked",
                Some("This account has been blocked. Contact support.".to_string()),
            ),
            AppError::AdminRequired => (StatusCode::FORBIDDEN, "admin_required", None),
            // Config is fetched asynchronously; until it loads, every
            // feature is unusable (fail closed, not fail open).
            AppError::ConfigUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "config_unavailable", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::GenerationApi(msg) => {
                tracing::warn!(error = %msg, "Generation API error");
                (
                    StatusCode::BAD_GATEWAY,
                    "generation_error",
                    Some("The AI service is unavailable. Please try again.".to_string()),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
