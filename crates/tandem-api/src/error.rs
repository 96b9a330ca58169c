use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Response text for every middleware rejection — missing cookie, bad or
/// expired token, unknown account. One string for all of them so callers
/// cannot tell which check failed.
pub const UNAUTHORIZED: &str = "Unauthorized";

/// Response text for a failed login, identical for an unknown email and a
/// wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input; user-correctable.
    #[error("{0}")]
    Validation(String),

    /// Duplicate email, duplicate or self-directed friend request,
    /// already friends.
    #[error("{0}")]
    Conflict(String),

    /// Missing/invalid session or wrong credentials.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The acting account may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Anything unexpected. Logged server-side; the body stays generic.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Conflict(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
