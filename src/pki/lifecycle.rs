//! Certificate issuance and bulk revocation for a principal.
//!
//! Both operations run against a principal-scoped store session, so the
//! Secret Store's own policies limit them to `pki-user/<p>` and `kv-user/<p>`.

use super::error::{PkiError, Result};
use crate::config::AppConfig;
use crate::identity::Principal;
use crate::observability::metrics;
use crate::secrets::{SecretData, SecretStore};
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::X509;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

/// A freshly issued client certificate, packaged for download.
#[derive(Clone)]
pub struct IssuedCertificate {
    /// DER-encoded PKCS#12 with key, leaf and issuing chain; empty password
    pub pkcs12: Vec<u8>,
    pub serial: String,
    /// Unix expiry reported by the issuer
    pub expiration: Option<i64>,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("serial", &self.serial)
            .field("expiration", &self.expiration)
            .field("pkcs12", &format_args!("[{} bytes]", self.pkcs12.len()))
            .finish()
    }
}

/// Per-serial outcome of a bulk revocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevocationSummary {
    pub revoked: Vec<String>,
    pub failed: Vec<String>,
    /// Listed serials left alone; the mount's own intermediate CA
    pub skipped: Vec<String>,
}

impl RevocationSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Issues and revokes certificates bound to a principal.
#[derive(Debug, Clone)]
pub struct CertificateLifecycle {
    domain: String,
    certificate_ttl: String,
}

impl CertificateLifecycle {
    pub fn new(domain: impl Into<String>, certificate_ttl: impl Into<String>) -> Self {
        Self { domain: domain.into(), certificate_ttl: certificate_ttl.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.identity.domain, &config.identity.certificate_ttl)
    }

    /// Issue a certificate, escrow it in the principal's KV mount and package it as PKCS#12.
    ///
    /// The escrow record is not rolled back if packaging fails afterwards.
    #[instrument(skip(self, store, principal), fields(principal = %principal))]
    pub async fn issue(
        &self,
        store: &dyn SecretStore,
        principal: &Principal,
    ) -> Result<IssuedCertificate> {
        let result = self.issue_inner(store, principal).await;
        match &result {
            Ok(cert) => {
                metrics::record_certificate_issued("success");
                info!(serial = %cert.serial, "Issued client certificate");
            }
            Err(e) => {
                metrics::record_certificate_issued("failed");
                error!(error = %e, "Certificate issuance failed");
            }
        }
        result
    }

    async fn issue_inner(
        &self,
        store: &dyn SecretStore,
        principal: &Principal,
    ) -> Result<IssuedCertificate> {
        let fail = |reason: String| PkiError::issuance_failed(principal.as_str(), reason);

        let issue_path = format!("pki-user/{}/issue/{}", principal, principal);
        let data = store
            .write(
                &issue_path,
                json!({
                    "common_name": format!("{}@{}", principal, self.domain),
                    "ttl": self.certificate_ttl,
                }),
            )
            .await
            .map_err(|e| fail(e.to_string()))?
            .ok_or_else(|| fail("issue response carried no data".to_string()))?;

        let serial = string_field(&data, "serial_number").map_err(fail)?;
        let certificate = string_field(&data, "certificate").map_err(fail)?;
        let private_key = string_field(&data, "private_key").map_err(fail)?;
        let issuing_ca = string_field(&data, "issuing_ca").map_err(fail)?;
        let ca_chain = chain_field(&data).map_err(fail)?;
        let expiration = data.get("expiration").and_then(Value::as_i64);

        let escrow_path = format!("kv-user/{}/{}", principal, serial);
        store
            .write(
                &escrow_path,
                json!({
                    "serial_number": serial,
                    "private_key": private_key,
                    "certificate": certificate,
                    "issuing_ca": issuing_ca,
                    "ca_chain": ca_chain,
                    "expiration": expiration,
                }),
            )
            .await
            .map_err(|e| fail(format!("escrow failed: {}", e)))?;

        let chain = if ca_chain.is_empty() { vec![issuing_ca] } else { ca_chain };
        let pkcs12 = package_pkcs12(principal.as_str(), &private_key, &certificate, &chain)
            .map_err(|e| fail(format!("PKCS#12 packaging failed: {}", e)))?;

        Ok(IssuedCertificate { pkcs12, serial, expiration })
    }

    /// Revoke every certificate the principal's mount has issued.
    ///
    /// The mount lists its own intermediate CA among its certificates; that
    /// serial is skipped. Individual failures are logged and reported in the
    /// summary; only a failed listing aborts.
    #[instrument(skip(self, store, principal), fields(principal = %principal))]
    pub async fn revoke_all(
        &self,
        store: &dyn SecretStore,
        principal: &Principal,
    ) -> Result<RevocationSummary> {
        let mount = format!("pki-user/{}", principal);
        let serials = store.list(&format!("{}/certs", mount)).await.map_err(|e| {
            error!(error = %e, "Listing certificates failed");
            PkiError::from(e)
        })?;

        let ca_serial = mount_ca_serial(store, &mount).await;

        let revoke_path = format!("{}/revoke", mount);
        let mut summary = RevocationSummary::default();
        for serial in serials {
            if ca_serial.as_deref() == Some(serial_key(&serial).as_str()) {
                debug!(serial = %serial, "Skipping the mount's CA certificate");
                summary.skipped.push(serial);
                continue;
            }
            match store.write(&revoke_path, json!({ "serial_number": serial })).await {
                Ok(_) => {
                    metrics::record_certificate_revoked("success");
                    info!(serial = %serial, "Revoked certificate");
                    summary.revoked.push(serial);
                }
                Err(e) => {
                    metrics::record_certificate_revoked("failed");
                    warn!(serial = %serial, error = %e, "Failed to revoke certificate");
                    summary.failed.push(serial);
                }
            }
        }

        info!(
            revoked = summary.revoked.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "Bulk revocation finished"
        );
        Ok(summary)
    }
}

/// Comparison key of the serial of `<mount>/cert/ca`, if it can be determined.
async fn mount_ca_serial(store: &dyn SecretStore, mount: &str) -> Option<String> {
    let path = format!("{}/cert/ca", mount);
    let data = match store.read(&path).await {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(e) => {
            warn!(path = %path, error = %e, "Could not read the mount CA; revoking every listed serial");
            return None;
        }
    };

    if let Some(serial) = data.get("serial_number").and_then(Value::as_str) {
        return Some(serial_key(serial));
    }
    let pem = data.get("certificate").and_then(Value::as_str)?;
    match pem_serial(pem) {
        Ok(hex) => Some(serial_key(&hex)),
        Err(e) => {
            warn!(path = %path, error = %e, "Mount CA certificate does not parse");
            None
        }
    }
}

fn pem_serial(pem: &str) -> std::result::Result<String, ErrorStack> {
    let cert = X509::from_pem(pem.as_bytes())?;
    let hex = cert.serial_number().to_bn()?.to_hex_str()?;
    Ok(hex.to_string())
}

/// Hex digits of a serial, lowercased and without leading zeros, so
/// `0A:1B`, `0a-1b` and `a1b` compare equal.
fn serial_key(serial: &str) -> String {
    let digits: String = serial
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    digits.trim_start_matches('0').to_string()
}

fn string_field(data: &SecretData, field: &str) -> std::result::Result<String, String> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| format!("issue response has no '{}'", field))
}

fn chain_field(data: &SecretData) -> std::result::Result<Vec<String>, String> {
    match data.get("ca_chain") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(String::from).ok_or_else(|| "non-string ca_chain entry".into()))
            .collect(),
        Some(_) => Err("ca_chain is not an array".to_string()),
    }
}

/// Bundle a PEM key, leaf and CA chain into a password-less PKCS#12.
pub fn package_pkcs12(
    friendly_name: &str,
    private_key_pem: &str,
    certificate_pem: &str,
    chain_pems: &[String],
) -> std::result::Result<Vec<u8>, ErrorStack> {
    let key = PKey::private_key_from_pem(private_key_pem.as_bytes())?;
    let cert = X509::from_pem(certificate_pem.as_bytes())?;

    let mut ca = Stack::new()?;
    for pem in chain_pems {
        for c in X509::stack_from_pem(pem.as_bytes())? {
            ca.push(c)?;
        }
    }

    let mut builder = Pkcs12::builder();
    builder.name(friendly_name).pkey(&key).cert(&cert).ca(ca);
    builder.build2("")?.to_der()
}
