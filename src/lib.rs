//! # idp-bridge
//!
//! Certificate trust and challenge broker that sits between an mTLS-terminating
//! proxy, an OAuth2/OIDC Authz Server and a Vault-like Secret Store.
//!
//! ## Architecture
//!
//! ```text
//! Proxy (client cert headers) → HTTP API → ChallengeBroker → Authz Server admin API
//!                                   ↓              ↓
//!                        CertificateLifecycle  RevocationValidator / ProvisioningManager
//!                                   ↓              ↓
//!                                 Secret Store (PKI mounts, KV, policies, JWT roles)
//! ```
//!
//! ## Core Components
//!
//! - **Identity**: principals, certificate identity headers and serial normalization
//! - **Authz**: login/consent challenge resolution against the Authz Server
//! - **PKI**: revocation checks, per-principal provisioning, PKCS#12 issuance
//! - **Secrets**: the [`secrets::SecretStore`] seam and its Vault client
//! - **Auth**: password verification and bearer token validation

pub mod api;
pub mod auth;
pub mod authz;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod pki;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "idp-bridge");
    }
}
