//! Lazy per-principal PKI/KV environment provisioning.
//!
//! A principal's environment consists of a PKI mount with an intermediate CA
//! signed by the shared root, an issuance role, two policies, a KV mount for
//! key escrow and the JWT/OIDC auth roles that bind the policies to the
//! principal's tokens. The OIDC role doubles as the existence marker and is
//! written last, so a failure anywhere earlier leaves the marker absent and
//! the next login resumes from the top. Every step is safe to repeat.

use super::error::{PkiError, Result};
use crate::config::AppConfig;
use crate::identity::Principal;
use crate::observability::metrics;
use crate::secrets::{MountOutcome, MountRequest, SecretData, SecretStore};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Steps of provisioning, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    ProbeMarker,
    MountPki,
    GenerateIntermediate,
    SignIntermediate,
    SetSignedIntermediate,
    IssuanceRole,
    PkiPolicy,
    MountKv,
    KvPolicy,
    JwtRole,
    OidcRole,
}

impl ProvisioningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProbeMarker => "probe_marker",
            Self::MountPki => "mount_pki",
            Self::GenerateIntermediate => "generate_intermediate",
            Self::SignIntermediate => "sign_intermediate",
            Self::SetSignedIntermediate => "set_signed_intermediate",
            Self::IssuanceRole => "issuance_role",
            Self::PkiPolicy => "pki_policy",
            Self::MountKv => "mount_kv",
            Self::KvPolicy => "kv_policy",
            Self::JwtRole => "jwt_role",
            Self::OidcRole => "oidc_role",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// The marker existed; nothing was written.
    AlreadyProvisioned,
    /// All steps ran.
    Provisioned,
}

/// Parameters that shape a principal's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSettings {
    pub domain: String,
    pub root_mount: String,
    pub organization: String,
    pub country: String,
    pub intermediate_ttl: String,
    /// Audience bound on the JWT role (the frontend client id)
    pub jwt_audience: String,
    /// Audience bound on the OIDC role
    pub oidc_audience: String,
    pub allowed_redirect_uris: Vec<String>,
}

impl ProvisioningSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            domain: config.identity.domain.clone(),
            root_mount: config.vault.root_mount.clone(),
            organization: config.identity.organization.clone(),
            country: config.identity.country.clone(),
            intermediate_ttl: config.identity.intermediate_ttl.clone(),
            jwt_audience: config.oidc.client_id.clone(),
            oidc_audience: config.oidc.oidc_role_audience.clone(),
            allowed_redirect_uris: config.oidc.allowed_redirect_uris.clone(),
        }
    }
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Store paths of one principal's environment.
struct Paths {
    pki_mount: String,
    kv_mount: String,
    oidc_role: String,
    jwt_role: String,
}

impl Paths {
    fn new(principal: &Principal) -> Self {
        Self {
            pki_mount: format!("pki-user/{}", principal),
            kv_mount: format!("kv-user/{}", principal),
            oidc_role: format!("auth/oidc/role/{}", principal),
            jwt_role: format!("auth/jwt/role/{}", principal),
        }
    }
}

fn policy_document(mount: &str) -> String {
    format!(
        "path \"{}/*\" {{ capabilities = [\"create\", \"read\", \"update\", \"delete\", \"list\", \"sudo\"] }}",
        mount
    )
}

fn required_string(data: Option<SecretData>, field: &str) -> std::result::Result<String, String> {
    data.as_ref()
        .and_then(|d| d.get(field))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| format!("response has no '{}'", field))
}

/// Ensure-exists manager for per-principal environments.
#[derive(Debug, Clone)]
pub struct ProvisioningManager {
    store: Arc<dyn SecretStore>,
    settings: ProvisioningSettings,
}

impl ProvisioningManager {
    pub fn new(store: Arc<dyn SecretStore>, settings: ProvisioningSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ProvisioningSettings {
        &self.settings
    }

    /// Whether the principal's existence marker is present.
    pub async fn is_provisioned(&self, principal: &Principal) -> Result<bool> {
        let marker = Paths::new(principal).oidc_role;
        let found = self.store.read(&marker).await.map_err(|e| {
            PkiError::provisioning_failed(
                principal.as_str(),
                ProvisioningStep::ProbeMarker,
                e.to_string(),
            )
        })?;
        Ok(found.is_some())
    }

    /// Create the principal's environment unless the marker already exists.
    #[instrument(skip(self, principal), fields(principal = %principal))]
    pub async fn ensure_provisioned(&self, principal: &Principal) -> Result<ProvisioningOutcome> {
        if self.is_provisioned(principal).await? {
            debug!("Principal already provisioned");
            return Ok(ProvisioningOutcome::AlreadyProvisioned);
        }

        info!("Provisioning PKI environment");
        match self.provision(principal).await {
            Ok(()) => {
                metrics::record_provisioning("provisioned");
                info!("Provisioned PKI environment");
                Ok(ProvisioningOutcome::Provisioned)
            }
            Err((step, reason)) => {
                metrics::record_provisioning("failed");
                warn!(step = %step, error = %reason, "Provisioning stopped; next login resumes");
                Err(PkiError::provisioning_failed(principal.as_str(), step, reason))
            }
        }
    }

    async fn provision(
        &self,
        principal: &Principal,
    ) -> std::result::Result<(), (ProvisioningStep, String)> {
        use ProvisioningStep as Step;

        let s = &self.settings;
        let paths = Paths::new(principal);
        let policies = json!([paths.pki_mount, paths.kv_mount]);

        let mount = MountRequest::new(
            "pki",
            format!("PKI for user {}", principal),
            s.intermediate_ttl.as_str(),
        );
        self.mount(Step::MountPki, &paths.pki_mount, &mount).await?;

        let generated = self
            .write(
                Step::GenerateIntermediate,
                &format!("{}/intermediate/generate/internal", paths.pki_mount),
                json!({ "common_name": format!("{}.{}", principal, s.domain) }),
            )
            .await?;
        let csr = required_string(generated, "csr").map_err(|e| (Step::GenerateIntermediate, e))?;

        let signed = self
            .write(
                Step::SignIntermediate,
                &format!("{}/root/sign-intermediate", s.root_mount),
                json!({ "csr": csr, "format": "pem_bundle", "ttl": s.intermediate_ttl }),
            )
            .await?;
        let certificate =
            required_string(signed, "certificate").map_err(|e| (Step::SignIntermediate, e))?;

        self.write(
            Step::SetSignedIntermediate,
            &format!("{}/intermediate/set-signed", paths.pki_mount),
            json!({ "certificate": certificate }),
        )
        .await?;

        self.write(
            Step::IssuanceRole,
            &format!("{}/roles/{}", paths.pki_mount, principal),
            json!({
                "allowed_domains": [format!("{}@{}", principal, s.domain)],
                "allow_bare_domains": true,
                "enforce_hostnames": true,
                "allow_localhost": false,
                "allow_ip_sans": false,
                "server_flag": false,
                "client_flag": true,
                "email_protection_flag": true,
                "organization": s.organization,
                "country": s.country,
            }),
        )
        .await?;

        self.write(
            Step::PkiPolicy,
            &format!("sys/policy/{}", paths.pki_mount),
            json!({ "policy": policy_document(&paths.pki_mount) }),
        )
        .await?;

        let kv = MountRequest::new(
            "kv",
            format!("Key value storage for keys of user {}", principal),
            s.intermediate_ttl.as_str(),
        );
        self.mount(Step::MountKv, &paths.kv_mount, &kv).await?;

        self.write(
            Step::KvPolicy,
            &format!("sys/policy/{}", paths.kv_mount),
            json!({ "policy": policy_document(&paths.kv_mount) }),
        )
        .await?;

        self.write(
            Step::JwtRole,
            &paths.jwt_role,
            json!({
                "role_type": "jwt",
                "bound_audiences": s.jwt_audience,
                "user_claim": "sub",
                "bound_subject": principal.as_str(),
                "policies": policies,
            }),
        )
        .await?;

        self.write(
            Step::OidcRole,
            &paths.oidc_role,
            json!({
                "bound_audiences": s.oidc_audience,
                "allowed_redirect_uris": s.allowed_redirect_uris,
                "user_claim": "sub",
                "bound_subject": principal.as_str(),
                "policies": policies,
            }),
        )
        .await?;

        Ok(())
    }

    async fn write(
        &self,
        step: ProvisioningStep,
        path: &str,
        body: Value,
    ) -> std::result::Result<Option<SecretData>, (ProvisioningStep, String)> {
        debug!(step = %step, path = %path, "Provisioning step");
        self.store.write(path, body).await.map_err(|e| (step, e.to_string()))
    }

    async fn mount(
        &self,
        step: ProvisioningStep,
        path: &str,
        request: &MountRequest,
    ) -> std::result::Result<(), (ProvisioningStep, String)> {
        match self.store.mount(path, request).await {
            Ok(MountOutcome::Created) => Ok(()),
            Ok(MountOutcome::AlreadyMounted) => {
                debug!(step = %step, path = %path, "Mount already present, resuming");
                Ok(())
            }
            Err(e) => Err((step, e.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::secrets::{InMemorySecretStore, StoreOp};

    /// Canned responses for the endpoints that compute data during provisioning.
    pub(crate) fn seed_pki_responses(store: &InMemorySecretStore, name: &str) {
        store.respond_to_write(
            format!("pki-user/{}/intermediate/generate/internal", name),
            json!({ "csr": "-----BEGIN CERTIFICATE REQUEST-----\n...\n-----END CERTIFICATE REQUEST-----" }),
        );
        store.respond_to_write(
            "pki/root/sign-intermediate",
            json!({ "certificate": "-----BEGIN CERTIFICATE-----\n...\n-----END CERTIFICATE-----" }),
        );
    }

    fn manager(store: &InMemorySecretStore) -> ProvisioningManager {
        ProvisioningManager::new(Arc::new(store.clone()), ProvisioningSettings::default())
    }

    fn alice() -> Principal {
        Principal::parse("alice").unwrap()
    }

    #[tokio::test]
    async fn provisions_in_order_with_marker_last() {
        let store = InMemorySecretStore::new();
        seed_pki_responses(&store, "alice");

        let outcome = manager(&store).ensure_provisioned(&alice()).await.unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Provisioned);

        assert_eq!(store.paths(StoreOp::Mount), vec!["pki-user/alice", "kv-user/alice"]);
        assert_eq!(
            store.paths(StoreOp::Write),
            vec![
                "pki-user/alice/intermediate/generate/internal",
                "pki/root/sign-intermediate",
                "pki-user/alice/intermediate/set-signed",
                "pki-user/alice/roles/alice",
                "sys/policy/pki-user/alice",
                "sys/policy/kv-user/alice",
                "auth/jwt/role/alice",
                "auth/oidc/role/alice",
            ]
        );
        assert!(store.is_mounted("pki-user/alice"));
    }

    #[tokio::test]
    async fn request_bodies_bind_principal() {
        let store = InMemorySecretStore::new();
        seed_pki_responses(&store, "alice");
        manager(&store).ensure_provisioned(&alice()).await.unwrap();

        let role = store.get("pki-user/alice/roles/alice").unwrap();
        assert_eq!(role["allowed_domains"], json!(["alice@fadalax.tech"]));
        assert_eq!(role["server_flag"], json!(false));
        assert_eq!(role["client_flag"], json!(true));
        assert_eq!(role["organization"], json!("imovies"));
        assert_eq!(role["country"], json!("CH"));

        let generate = store.get("pki-user/alice/intermediate/generate/internal").unwrap();
        assert_eq!(generate["common_name"], json!("alice.fadalax.tech"));

        let jwt = store.get("auth/jwt/role/alice").unwrap();
        assert_eq!(jwt["bound_subject"], json!("alice"));
        assert_eq!(jwt["bound_audiences"], json!("fadalax-frontend"));
        assert_eq!(jwt["policies"], json!(["pki-user/alice", "kv-user/alice"]));

        let oidc = store.get("auth/oidc/role/alice").unwrap();
        assert_eq!(oidc["bound_audiences"], json!("vault"));

        let policy = store.get("sys/policy/kv-user/alice").unwrap();
        assert!(policy["policy"].as_str().unwrap().contains("path \"kv-user/alice/*\""));
    }

    #[tokio::test]
    async fn second_call_writes_nothing() {
        let store = InMemorySecretStore::new();
        seed_pki_responses(&store, "alice");
        let manager = manager(&store);

        manager.ensure_provisioned(&alice()).await.unwrap();
        store.clear_calls();

        let outcome = manager.ensure_provisioned(&alice()).await.unwrap();
        assert_eq!(outcome, ProvisioningOutcome::AlreadyProvisioned);
        assert_eq!(store.count(StoreOp::Write), 0);
        assert_eq!(store.count(StoreOp::Mount), 0);
        assert_eq!(store.paths(StoreOp::Read), vec!["auth/oidc/role/alice"]);
    }

    #[tokio::test]
    async fn failure_leaves_marker_absent_and_retry_resumes() {
        let store = InMemorySecretStore::new();
        seed_pki_responses(&store, "alice");
        store.fail_on(StoreOp::Write, "sys/policy/kv-user/");
        let manager = manager(&store);

        let err = manager.ensure_provisioned(&alice()).await.unwrap_err();
        match err {
            PkiError::ProvisioningFailed { principal, step, .. } => {
                assert_eq!(principal, "alice");
                assert_eq!(step, ProvisioningStep::KvPolicy);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.get("auth/oidc/role/alice").is_none());

        store.clear_failures();
        let outcome = manager.ensure_provisioned(&alice()).await.unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Provisioned);
        assert!(store.get("auth/oidc/role/alice").is_some());
    }

    #[tokio::test]
    async fn missing_csr_fails_generate_step() {
        let store = InMemorySecretStore::new();
        let err = manager(&store).ensure_provisioned(&alice()).await.unwrap_err();
        assert!(matches!(
            err,
            PkiError::ProvisioningFailed { step: ProvisioningStep::GenerateIntermediate, .. }
        ));
    }

    #[tokio::test]
    async fn marker_lookup_failure_is_reported() {
        let store = InMemorySecretStore::new();
        store.fail_on(StoreOp::Read, "auth/oidc/role/");
        let err = manager(&store).ensure_provisioned(&alice()).await.unwrap_err();
        assert!(matches!(
            err,
            PkiError::ProvisioningFailed { step: ProvisioningStep::ProbeMarker, .. }
        ));
        assert_eq!(store.count(StoreOp::Mount), 0);
    }
}
