//! Revocation checks for presented client certificates.

use super::error::{PkiError, Result};
use crate::identity::{CertificateIdentity, Principal};
use crate::secrets::SecretStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A certificate is trusted if it was never revoked (`0`) or its revocation
/// time has not been reached yet.
pub fn is_valid_at(revocation_time: i64, now: i64) -> bool {
    revocation_time == 0 || revocation_time > now
}

/// Looks up certificate records on the issuing PKI mount.
///
/// Certificates of the admin principal are issued from the root mount;
/// everybody else's come from their own `pki-user/<p>` intermediate.
#[derive(Debug, Clone)]
pub struct RevocationValidator {
    store: Arc<dyn SecretStore>,
    root_mount: String,
    admin_principal: String,
}

impl RevocationValidator {
    pub fn new(
        store: Arc<dyn SecretStore>,
        root_mount: impl Into<String>,
        admin_principal: impl Into<String>,
    ) -> Self {
        Self { store, root_mount: root_mount.into(), admin_principal: admin_principal.into() }
    }

    /// Mount that issued `principal`'s certificates.
    pub fn mount_for(&self, principal: &Principal) -> String {
        if principal.as_str() == self.admin_principal {
            self.root_mount.clone()
        } else {
            format!("pki-user/{}", principal)
        }
    }

    /// Check `identity` against the current time.
    pub async fn is_valid(&self, identity: &CertificateIdentity) -> Result<bool> {
        self.is_valid_as_of(identity, chrono::Utc::now().timestamp()).await
    }

    /// Check `identity` against an explicit Unix time.
    #[instrument(skip(self, identity), fields(principal = %identity.principal, serial = %identity.serial))]
    pub async fn is_valid_as_of(&self, identity: &CertificateIdentity, now: i64) -> Result<bool> {
        let path = format!("{}/cert/{}", self.mount_for(&identity.principal), identity.serial);

        let record = match self.store.read(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(path = %path, "Certificate record not found");
                return Err(PkiError::lookup_failed(path, "record not found"));
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Certificate lookup failed");
                return Err(PkiError::lookup_failed(path, e.to_string()));
            }
        };

        let revocation_time = match record.get("revocation_time") {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| PkiError::malformed_record(&path, "revocation_time is not an integer"))?,
            Some(_) => {
                return Err(PkiError::malformed_record(path, "revocation_time is not an integer"))
            }
            None => return Err(PkiError::malformed_record(path, "missing revocation_time")),
        };

        let valid = is_valid_at(revocation_time, now);
        debug!(revocation_time, valid, "Checked certificate revocation state");
        Ok(valid)
    }
}
