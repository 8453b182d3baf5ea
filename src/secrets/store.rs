//! Secret Store capability.
//!
//! The bridge needs a small slice of a Vault-shaped API: generic logical
//! reads/writes/lists, secrets-engine mounts and JWT-role logins that yield a
//! principal-scoped session.

use super::error::Result;
use super::types::{MountOutcome, MountRequest, SecretData, SecretString};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Operations the bridge performs against the Secret Store.
///
/// Paths are logical paths without the API prefix or a leading slash, e.g.
/// `pki-user/alice/cert/0a:1b` or `auth/oidc/role/alice`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request handler.
#[async_trait]
pub trait SecretStore: Send + Sync + Debug {
    /// Read the `data` object at `path`. `Ok(None)` when nothing exists there.
    async fn read(&self, path: &str) -> Result<Option<SecretData>>;

    /// Write `body` to `path`, returning the response `data` object if any.
    async fn write(&self, path: &str, body: Value) -> Result<Option<SecretData>>;

    /// List keys under `path`. A missing path lists as empty.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Enable a secrets engine at `path`.
    async fn mount(&self, path: &str, request: &MountRequest) -> Result<MountOutcome>;

    /// Exchange a bearer JWT for a session bound to the JWT auth `role`.
    async fn login_jwt(&self, role: &str, jwt: &SecretString) -> Result<Arc<dyn SecretStore>>;

    /// Check that the store is reachable and unsealed.
    async fn health(&self) -> Result<()>;
}

/// Reject path segments that could escape the intended subtree.
pub fn validate_path(path: &str) -> Result<()> {
    use super::error::SecretsError;

    if path.is_empty() {
        return Err(SecretsError::invalid_path(path, "path is empty"));
    }
    if path.starts_with('/') {
        return Err(SecretsError::invalid_path(path, "path must be relative"));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(SecretsError::invalid_path(path, "empty or relative segment"));
    }
    if path.chars().any(|c| c.is_control() || c.is_whitespace() || c == '?' || c == '#') {
        return Err(SecretsError::invalid_path(path, "path contains reserved characters"));
    }
    Ok(())
}
