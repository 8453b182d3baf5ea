//! # Client Identity
//!
//! Everything needed to turn proxy-supplied certificate headers into a
//! [`CertificateIdentity`]: the [`Principal`] newtype, the identity header
//! parser and the serial normalizer. Nothing in here performs I/O.

pub mod certificate;
pub mod principal;
pub mod serial;

pub use certificate::{CertificateIdentity, IdentityParser};
pub use principal::Principal;
pub use serial::normalize_serial;

use thiserror::Error;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors raised while validating client identity input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Username is empty or contains non-alphanumeric characters.
    #[error("Invalid principal '{value}': must be non-empty ASCII alphanumeric")]
    InvalidPrincipal { value: String },

    /// Certificate serial could not be canonicalized.
    #[error("Malformed serial '{value}': {reason}")]
    MalformedSerial { value: String, reason: String },

    /// Trusted domain produced an unusable identity pattern.
    #[error("Invalid identity domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },
}

impl IdentityError {
    /// Create an invalid principal error.
    pub fn invalid_principal(value: impl Into<String>) -> Self {
        Self::InvalidPrincipal { value: value.into() }
    }

    /// Create a malformed serial error.
    pub fn malformed_serial(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSerial { value: value.into(), reason: reason.into() }
    }

    /// Create an invalid domain error.
    pub fn invalid_domain(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDomain { domain: domain.into(), reason: reason.into() }
    }
}
