use axum::{http::StatusCode, response::IntoResponse};
use tracing::{error, warn};

use crate::errors::Error;

/// HTTP-facing error. Only the status text leaves the process; the cause is
/// logged when the error is built.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal detail, for logs and tests only.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Forbidden(msg) | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let text = status.canonical_reason().unwrap_or("Error");
        (status, text).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => {
                warn!(error = %msg, "Rejected invalid request");
                ApiError::BadRequest(msg)
            }
            Error::Unauthenticated(msg) => {
                warn!(error = %msg, "Rejected unauthenticated request");
                ApiError::Forbidden(msg)
            }
            other => {
                error!(error = %other, retryable = other.is_retryable(), "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}
