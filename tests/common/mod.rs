//! Common test utilities for all integration tests.
//!
//! Builds an [`AppState`] over in-memory doubles and generates real PKI
//! material with `rcgen` so PKCS#12 packaging can be exercised end to end.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::sync::Arc;

use idp_bridge::{
    api::AppState,
    auth::{StaticCredentials, StaticTokenValidator},
    authz::InMemoryAuthzServer,
    identity::Principal,
    secrets::InMemorySecretStore,
    AppConfig,
};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, SerialNumber};
use serde_json::{json, Value};

pub const DOMAIN: &str = "fadalax.tech";
pub const IDENTITY_HEADER: &str = "x-fadalax-auth";
pub const SERIAL_HEADER: &str = "x-fadalax-serial";

/// Handles to the doubles behind a test [`AppState`].
pub struct TestApp {
    pub state: AppState,
    pub authz: InMemoryAuthzServer,
    pub store: InMemorySecretStore,
}

pub fn principal(name: &str) -> Principal {
    Principal::parse(name).expect("valid principal")
}

/// State with password `hunter2` for `carol` and bearer token `token-alice`
/// bound to `alice`.
pub fn test_app() -> TestApp {
    let authz = InMemoryAuthzServer::new();
    let store = InMemorySecretStore::new();
    let credentials = StaticCredentials::new().with_password("carol", "hunter2");
    let tokens = StaticTokenValidator::new().with_token("token-alice", principal("alice"));

    let state = AppState::new(
        AppConfig::default(),
        Arc::new(authz.clone()),
        Arc::new(store.clone()),
        Arc::new(credentials),
        Arc::new(tokens),
    )
    .expect("state builds from default config");

    TestApp { state, authz, store }
}

/// Canned responses for the endpoints that compute data during provisioning.
pub fn seed_pki_responses(store: &InMemorySecretStore, name: &str) {
    store.respond_to_write(
        format!("pki-user/{}/intermediate/generate/internal", name),
        json!({ "csr": "-----BEGIN CERTIFICATE REQUEST-----\n...\n-----END CERTIFICATE REQUEST-----" }),
    );
    store.respond_to_write(
        "pki/root/sign-intermediate",
        json!({ "certificate": "-----BEGIN CERTIFICATE-----\n...\n-----END CERTIFICATE-----" }),
    );
}

/// Self-signed CA PEM with a fixed serial, shaped like a mount's `cert/ca`.
pub fn ca_with_serial(name: &str, serial: &[u8]) -> String {
    let key = KeyPair::generate().expect("ca key");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.serial_number = Some(SerialNumber::from_slice(serial));
    params.distinguished_name.push(DnType::CommonName, format!("{}.{}", name, DOMAIN));
    params.self_signed(&key).expect("self-signed ca").pem()
}

/// PEM material shaped like a PKI issue response.
pub struct IssuedMaterial {
    pub ca_pem: String,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

impl IssuedMaterial {
    /// Generate a CA and a client leaf for `name@fadalax.tech`.
    pub fn generate(name: &str) -> Self {
        let ca_key = KeyPair::generate().expect("ca key");
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.distinguished_name.push(DnType::CommonName, format!("{}.{}", name, DOMAIN));
        let ca = ca_params.self_signed(&ca_key).expect("self-signed ca");

        let leaf_key = KeyPair::generate().expect("leaf key");
        let mut leaf_params = CertificateParams::new(Vec::<String>::new()).expect("leaf params");
        leaf_params.distinguished_name.push(DnType::CommonName, format!("{}@{}", name, DOMAIN));
        let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).expect("signed leaf");

        Self {
            ca_pem: ca.pem(),
            certificate_pem: leaf.pem(),
            private_key_pem: leaf_key.serialize_pem(),
        }
    }

    /// Issue endpoint response body.
    pub fn issue_response(&self, serial: &str) -> Value {
        json!({
            "serial_number": serial,
            "certificate": self.certificate_pem,
            "private_key": self.private_key_pem,
            "private_key_type": "ec",
            "issuing_ca": self.ca_pem,
            "ca_chain": [self.ca_pem],
            "expiration": 1_900_000_000,
        })
    }
}
