//! # Caller Authentication
//!
//! Two capabilities the broker and the certificate endpoints rely on:
//! - [`CredentialVerifier`]: username/password check against the user database
//! - [`TokenValidator`]: bearer JWT to [`crate::identity::Principal`]

pub mod credentials;
pub mod hashing;
pub mod token;

pub use credentials::{CredentialVerifier, PgCredentialStore, StaticCredentials};
pub use token::{parse_bearer, OidcTokenValidator, StaticTokenValidator, TokenValidator};

use thiserror::Error;

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingBearer,

    #[error("Malformed Authorization header")]
    MalformedBearer,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The user database could not be queried
    #[error("User store error: {0}")]
    Persistence(String),

    /// Issuer metadata or signing keys could not be fetched
    #[error("Key discovery failed: {0}")]
    Discovery(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Persistence(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidToken(err.to_string())
    }
}
