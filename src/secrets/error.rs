//! Error types for Secret Store operations.

use thiserror::Error;

/// Result type for Secret Store operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while talking to the Secret Store.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The store could not be reached or the request timed out.
    #[error("Secret store connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Token login was refused.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The store answered with a non-success status.
    #[error("Secret store returned {status} for '{path}': {message}")]
    Status { status: u16, path: String, message: String },

    /// Path rejected before any request was made.
    #[error("Invalid secret path: {path} - {reason}")]
    InvalidPath { path: String, reason: String },

    /// Request or response body did not have the expected shape.
    #[error("Invalid secret value: {reason}")]
    InvalidValue { reason: String },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SecretsError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a status error for a failed request.
    pub fn status(status: u16, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status { status, path: path.into(), message: message.into() }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into(), reason: reason.into() }
    }

    /// Create an invalid value error.
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue { reason: reason.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// HTTP status reported by the store, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SecretsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::connection_failed(err.to_string())
        } else if err.is_decode() {
            Self::invalid_value(format!("unexpected response body: {}", err))
        } else {
            Self::backend_error(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = SecretsError::status(404, "pki-user/alice/cert/aa", "not found");
        assert!(matches!(err, SecretsError::Status { .. }));
        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("pki-user/alice/cert/aa"));

        let err = SecretsError::connection_failed("timeout");
        assert!(matches!(err, SecretsError::ConnectionFailed { .. }));
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_error_display() {
        let err = SecretsError::invalid_path("kv-user/../pki", "traversal");
        assert_eq!(err.to_string(), "Invalid secret path: kv-user/../pki - traversal");
    }
}
