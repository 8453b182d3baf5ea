//! Error types for certificate trust, provisioning and lifecycle operations.

use super::provisioning::ProvisioningStep;
use crate::identity::IdentityError;
use crate::secrets::SecretsError;
use thiserror::Error;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, PkiError>;

#[derive(Error, Debug)]
pub enum PkiError {
    #[error(transparent)]
    InvalidPrincipal(#[from] IdentityError),

    /// The certificate record could not be fetched. Callers fail closed.
    #[error("Certificate lookup at '{path}' failed: {reason}")]
    LookupFailed { path: String, reason: String },

    /// The certificate record lacks an integer `revocation_time`.
    #[error("Certificate record at '{path}' is malformed: {reason}")]
    MalformedRecord { path: String, reason: String },

    /// A provisioning step failed; the marker is still absent so the next login resumes.
    #[error("Provisioning of '{principal}' failed at step {step}: {reason}")]
    ProvisioningFailed { principal: String, step: ProvisioningStep, reason: String },

    #[error("Issuing a certificate for '{principal}' failed: {reason}")]
    IssuanceFailed { principal: String, reason: String },

    #[error(transparent)]
    Secrets(#[from] SecretsError),
}

impl PkiError {
    pub fn lookup_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed { path: path.into(), reason: reason.into() }
    }

    pub fn malformed_record(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { path: path.into(), reason: reason.into() }
    }

    pub fn provisioning_failed(
        principal: impl Into<String>,
        step: ProvisioningStep,
        reason: impl Into<String>,
    ) -> Self {
        Self::ProvisioningFailed { principal: principal.into(), step, reason: reason.into() }
    }

    pub fn issuance_failed(principal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IssuanceFailed { principal: principal.into(), reason: reason.into() }
    }
}
