use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Shared error-message constants so handlers and tests agree on wording.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const PRODUCT_NOT_FOUND: &str = "Product not found";
    pub const LICENSE_NOT_FOUND: &str = "License not found";
    pub const SESSION_NOT_FOUND: &str = "Session not found";
    pub const COUPON_NOT_FOUND: &str = "Coupon not found";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
    pub const EMAIL_EMPTY: &str = "customer email must not be empty";
    pub const SLUG_EMPTY: &str = "product slug must not be empty";
    pub const NAME_EMPTY: &str = "name must not be empty";
    pub const CODE_EMPTY: &str = "coupon code must not be empty";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Provider(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::RateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limited",
                Some(msg.clone()),
            ),
            AppError::Provider(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment provider error",
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience for the `queries::get_x(..)?.or_not_found(msg::X_NOT_FOUND)?` pattern.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> std::result::Result<T, AppError>;
    fn or_bad_request(self, msg: &str) -> std::result::Result<T, AppError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> std::result::Result<T, AppError> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }

    fn or_bad_request(self, msg: &str) -> std::result::Result<T, AppError> {
        self.ok_or_else(|| AppError::BadRequest(msg.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
