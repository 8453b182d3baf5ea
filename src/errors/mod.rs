//! # Error Handling
//!
//! Crate-level error type. Each component keeps its own `thiserror` enum
//! (`IdentityError`, `SecretsError`, `PkiError`, `AuthzError`, `AuthError`);
//! they collapse into [`Error`] at the broker and HTTP boundaries, where only
//! the category survives into the response.

use crate::auth::AuthError;
use crate::authz::AuthzError;
use crate::identity::IdentityError;
use crate::pki::PkiError;
use crate::secrets::SecretsError;

/// Custom result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the identity bridge
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed principal, serial, header or form input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No valid credential was presented
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The Authz Server or Secret Store failed or timed out
    #[error("Upstream {service} error: {message}")]
    Upstream { service: &'static str, message: String },

    /// Provisioning stopped part way; a retry resumes it
    #[error("Provisioning failed for '{principal}': {message}")]
    ProvisioningFailed { principal: String, message: String },

    /// Certificate issuance failed
    #[error("Issuance failed for '{principal}': {message}")]
    IssuanceFailed { principal: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors (listener bind, serve loop)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new unauthenticated error
    pub fn unauthenticated<S: Into<String>>(message: S) -> Self {
        Self::Unauthenticated(message.into())
    }

    /// Create a new upstream error for the named remote service
    pub fn upstream<S: Into<String>>(service: &'static str, message: S) -> Self {
        Self::Upstream { service, message: message.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status code for this error category
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Unauthenticated(_) => 403,
            Error::Upstream { .. }
            | Error::ProvisioningFailed { .. }
            | Error::IssuanceFailed { .. }
            | Error::Config(_)
            | Error::Transport(_)
            | Error::Io(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Whether the caller (browser, client) may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. } | Error::ProvisioningFailed { .. } | Error::IssuanceFailed { .. }
        )
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<SecretsError> for Error {
    fn from(err: SecretsError) -> Self {
        match err {
            SecretsError::ConfigError { message } => Error::Config(message),
            other => Error::upstream("secret store", other.to_string()),
        }
    }
}

impl From<AuthzError> for Error {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidSubject(msg) => Error::Validation(msg),
            other => Error::upstream("authz server", other.to_string()),
        }
    }
}

impl From<PkiError> for Error {
    fn from(err: PkiError) -> Self {
        match err {
            PkiError::InvalidPrincipal(e) => Error::from(e),
            PkiError::LookupFailed { .. } | PkiError::MalformedRecord { .. } => {
                Error::Unauthenticated(err.to_string())
            }
            PkiError::ProvisioningFailed { ref principal, .. } => Error::ProvisioningFailed {
                principal: principal.clone(),
                message: err.to_string(),
            },
            PkiError::IssuanceFailed { ref principal, .. } => {
                Error::IssuanceFailed { principal: principal.clone(), message: err.to_string() }
            }
            PkiError::Secrets(e) => Error::from(e),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Persistence(msg) => Error::upstream("user store", msg),
            AuthError::Discovery(msg) => Error::upstream("token issuer", msg),
            other => Error::Unauthenticated(other.to_string()),
        }
    }
}
