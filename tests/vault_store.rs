//! Vault client against a mock server.

use idp_bridge::{
    config::VaultConfig,
    identity::Principal,
    pki::CertificateLifecycle,
    secrets::{MountOutcome, MountRequest, SecretStore, SecretString, SecretsError, VaultSecretStore},
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_in(server: &MockServer, namespace: Option<&str>) -> VaultSecretStore {
    VaultSecretStore::new(&VaultConfig {
        address: server.uri(),
        token: SecretString::new("hvs.service"),
        namespace: namespace.map(String::from),
        ..VaultConfig::default()
    })
    .unwrap()
}

fn store(server: &MockServer) -> VaultSecretStore {
    store_in(server, None)
}

fn login_response(token: &str, role: &str) -> serde_json::Value {
    json!({
        "request_id": "r2",
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": null,
        "warnings": null,
        "wrap_info": null,
        "auth": {
            "client_token": token,
            "accessor": "acc",
            "policies": [format!("pki-user/{}", role)],
            "token_policies": [format!("pki-user/{}", role)],
            "metadata": { "role": role },
            "lease_duration": 3600,
            "renewable": true,
            "entity_id": "e1",
            "token_type": "service",
            "orphan": true
        }
    })
}

#[tokio::test]
async fn read_returns_data_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pki-user/alice/cert/0a:1b"))
        .and(header("X-Vault-Token", "hvs.service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "r1",
            "data": { "certificate": "PEM", "revocation_time": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = store(&server).read("pki-user/alice/cert/0a:1b").await.unwrap().unwrap();
    assert_eq!(data["revocation_time"], 0);
}

#[tokio::test]
async fn missing_path_reads_as_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/oidc/role/alice"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    assert!(store(&server).read("auth/oidc/role/alice").await.unwrap().is_none());
}

#[tokio::test]
async fn write_accepts_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/policy/kv-user/alice"))
        .and(body_json(json!({ "policy": "path \"kv-user/alice/*\" {}" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let out = store(&server)
        .write("sys/policy/kv-user/alice", json!({ "policy": "path \"kv-user/alice/*\" {}" }))
        .await
        .unwrap();
    assert!(out.is_none());
}

#[tokio::test]
async fn write_error_carries_status_and_messages() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/pki-user/alice/revoke"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] })),
        )
        .mount(&server)
        .await;

    let err = store(&server)
        .write("pki-user/alice/revoke", json!({ "serial_number": "aa" }))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert!(err.to_string().contains("permission denied"));
}

#[tokio::test]
async fn list_uses_list_verb() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path("/v1/pki-user/alice/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "keys": ["0a:1b", "2c:3d"] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("LIST"))
        .and(path("/v1/pki-user/bob/certs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let s = store(&server);
    assert_eq!(s.list("pki-user/alice/certs").await.unwrap(), vec!["0a:1b", "2c:3d"]);
    assert!(s.list("pki-user/bob/certs").await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_listing_is_an_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("LIST"))
        .and(path("/v1/pki-user/alice/certs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "keys": "oops" } })),
        )
        .mount(&server)
        .await;

    let err = CertificateLifecycle::new("fadalax.tech", "336h")
        .revoke_all(&store(&server), &Principal::parse("alice").unwrap())
        .await
        .unwrap_err();

    let err = idp_bridge::Error::from(err);
    assert!(matches!(err, idp_bridge::Error::Upstream { .. }));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn existing_mount_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/pki-user/alice"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["path is already in use at pki-user/alice/"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/kv-user/alice"))
        .and(body_partial_json(json!({
            "type": "kv",
            "description": "kv",
            "config": { "max_lease_ttl": "43800h" }
        })))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let s = store(&server);
    let pki = MountRequest::new("pki", "pki", "43800h");
    let kv = MountRequest::new("kv", "kv", "43800h");
    assert_eq!(s.mount("pki-user/alice", &pki).await.unwrap(), MountOutcome::AlreadyMounted);
    assert_eq!(s.mount("kv-user/alice", &kv).await.unwrap(), MountOutcome::Created);
}

#[tokio::test]
async fn jwt_login_yields_scoped_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .and(body_partial_json(json!({ "role": "alice", "jwt": "eyJ.token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response("hvs.alice", "alice")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("LIST"))
        .and(path("/v1/pki-user/alice/certs"))
        .and(header("X-Vault-Token", "hvs.alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "keys": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    let session =
        store(&server).login_jwt("alice", &SecretString::new("eyJ.token")).await.unwrap();
    assert!(session.list("pki-user/alice/certs").await.unwrap().is_empty());
}

#[tokio::test]
async fn refused_jwt_login_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/jwt/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "errors": ["role not found"] })),
        )
        .mount(&server)
        .await;

    let err = store(&server).login_jwt("mallory", &SecretString::new("x")).await.unwrap_err();
    assert!(matches!(err, SecretsError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn namespace_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pki/cert/ca"))
        .and(header("X-Vault-Namespace", "fadalax"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let s = store_in(&server, Some("fadalax"));
    assert!(s.read("pki/cert/ca").await.unwrap().is_some());
}

#[tokio::test]
async fn health_maps_sealed_and_standby() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "errors": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let s = store(&server);
    assert!(s.health().await.is_ok());
    assert!(matches!(s.health().await, Err(SecretsError::ConnectionFailed { .. })));
}
