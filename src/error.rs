use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Payment gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Payment has expired")]
    PaymentExpired,

    #[error("Unknown invoice status: {0}")]
    UnknownStatus(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body returned to clients: a stable machine-readable kind plus a
/// human message. Internal causes (database, pool) are logged, never leaked.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Token needed".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::BAD_REQUEST, "forbidden", msg.clone()),
            AppError::PaymentGateway(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "payment_gateway_error",
                    "Payment gateway unavailable".to_string(),
                )
            }
            AppError::GatewayTimeout(msg) => {
                tracing::error!("Payment gateway timeout: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "gateway_timeout",
                    "Payment gateway timed out".to_string(),
                )
            }
            AppError::PaymentExpired => (
                StatusCode::PAYMENT_REQUIRED,
                "payment_expired",
                "Payment has expired".to_string(),
            ),
            AppError::UnknownStatus(status) => (
                StatusCode::NOT_FOUND,
                "unknown_status",
                format!("Unknown status value {}", status),
            ),
            AppError::Notification(msg) => {
                tracing::error!("Notification error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "notification_error",
                    "Fulfillment email could not be delivered".to_string(),
                )
            }
            AppError::Decode(msg) => (StatusCode::BAD_REQUEST, "decode_error", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            AppError::Json(e) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("Invalid JSON: {}", e),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: kind,
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience for turning `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
