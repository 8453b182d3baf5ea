//! # Certificate Trust and Lifecycle
//!
//! - [`RevocationValidator`]: is a presented certificate still trusted?
//! - [`ProvisioningManager`]: ensure-exists of a principal's PKI/KV environment
//! - [`CertificateLifecycle`]: issue PKCS#12 bundles and bulk-revoke

pub mod error;
pub mod lifecycle;
pub mod provisioning;
pub mod revocation;

pub use error::{PkiError, Result};
pub use lifecycle::{package_pkcs12, CertificateLifecycle, IssuedCertificate, RevocationSummary};
pub use provisioning::{
    ProvisioningManager, ProvisioningOutcome, ProvisioningSettings, ProvisioningStep,
};
pub use revocation::{is_valid_at, RevocationValidator};
