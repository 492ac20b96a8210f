//! API error type and HTTP mapping
//!
//! Business-rule violations surface as 4xx with a stable error code;
//! anything unexpected is a 500. Nothing is mutated when a 4xx is returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// barre-common error, mapped per variant
    #[error(transparent)]
    Common(#[from] barre_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => return common_error_response(err),
        };

        error_body(status, error_code, &message)
    }
}

/// Map the shared error enum onto HTTP statuses and stable codes
fn common_error_response(err: barre_common::Error) -> Response {
    use barre_common::Error;

    let (status, code) = match &err {
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        Error::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        Error::MembershipInactive => (StatusCode::BAD_REQUEST, "MEMBERSHIP_INACTIVE"),
        Error::PastClass => (StatusCode::BAD_REQUEST, "PAST_CLASS"),
        Error::CapacityExceeded => (StatusCode::BAD_REQUEST, "CAPACITY_EXCEEDED"),
        Error::AlreadyBooked => (StatusCode::BAD_REQUEST, "ALREADY_BOOKED"),
        Error::InsufficientCredits => (StatusCode::BAD_REQUEST, "INSUFFICIENT_CREDITS"),
        Error::AlreadyStarted => (StatusCode::BAD_REQUEST, "ALREADY_STARTED"),
        Error::AlreadyMarked => (StatusCode::BAD_REQUEST, "ALREADY_MARKED"),
        Error::ClassNotStarted => (StatusCode::BAD_REQUEST, "CLASS_NOT_STARTED"),
        Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    error_body(status, code, &err.to_string())
}

fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));

    (status, body).into_response()
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
