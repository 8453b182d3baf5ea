//! HashiCorp Vault implementation of [`SecretStore`].
//!
//! Engine mounts, JWT login and health checks go through the typed `vaultrs`
//! endpoints on a [`VaultClient`]. The generic logical operations (`read`,
//! `write`, `list` on an arbitrary `/v1/<path>` with a free-form JSON body)
//! have no `vaultrs` counterpart, since every `vaultrs` endpoint fixes its
//! request and response shape per engine; those three are sent directly with
//! `reqwest` using the same address, token and namespace.

use super::error::{Result, SecretsError};
use super::store::{validate_path, SecretStore};
use super::types::{MountOutcome, MountRequest, SecretData, SecretString};
use crate::config::VaultConfig;
use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vaultrs::api::sys::requests::{EnableEngineDataConfigBuilder, EnableEngineRequestBuilder};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Mount of the JWT auth method used for principal sessions.
const JWT_AUTH_MOUNT: &str = "jwt";

/// Standard response envelope of logical endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<SecretData>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Token-independent connection parameters, shared by every session.
#[derive(Debug)]
struct Connection {
    address: String,
    namespace: Option<String>,
    verify: bool,
    timeout: Duration,
}

/// Vault client bound to one token.
///
/// [`SecretStore::login_jwt`] returns a new instance that shares the
/// connection parameters and HTTP pool but carries the principal's token.
#[derive(Clone)]
pub struct VaultSecretStore {
    client: Arc<VaultClient>,
    http: reqwest::Client,
    connection: Arc<Connection>,
    token: SecretString,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("address", &self.connection.address)
            .field("namespace", &self.connection.namespace)
            .field("token", &self.token)
            .finish()
    }
}

impl VaultSecretStore {
    /// Build a client for the configured address and service token.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        if config.token.is_empty() {
            warn!("VAULT_TOKEN is empty; service-token requests will be rejected");
        }

        // The vaultrs settings builder panics on an unparseable address
        url::Url::parse(&config.address).map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault address '{}': {}", config.address, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| {
                SecretsError::config_error(format!("Failed to build Vault HTTP client: {}", e))
            })?;

        let connection = Connection {
            address: config.address.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            verify: !config.accept_invalid_certs,
            timeout: config.request_timeout(),
        };

        Self::connect(Arc::new(connection), http, config.token.clone())
    }

    fn connect(
        connection: Arc<Connection>,
        http: reqwest::Client,
        token: SecretString,
    ) -> Result<Self> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&connection.address);
        settings_builder.token(token.expose_secret());
        settings_builder.namespace(connection.namespace.clone());
        settings_builder.verify(connection.verify);
        settings_builder.timeout(Some(connection.timeout));

        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;

        let client = VaultClient::new(settings).map_err(|e| {
            SecretsError::connection_failed(format!("Failed to create Vault client: {}", e))
        })?;

        Ok(Self { client: Arc::new(client), http, connection, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.connection.address, path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        validate_path(path)?;

        let mut builder = self
            .http
            .request(method.clone(), self.url(path))
            .header(TOKEN_HEADER, self.token.expose_secret());
        if let Some(namespace) = &self.connection.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            error!(error = %e, method = %method, path = %path, "Secret store request failed");
            SecretsError::from(e)
        })
    }

    /// Parse a response envelope, tolerating empty (204) bodies.
    async fn data(response: Response) -> Result<Option<SecretData>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }

    async fn failure(path: &str, response: Response) -> SecretsError {
        let status = response.status().as_u16();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        rejected(path, status, body.errors)
    }
}

fn rejected(path: &str, status: u16, errors: Vec<String>) -> SecretsError {
    let message = if errors.is_empty() { "no error detail".to_string() } else { errors.join("; ") };
    warn!(status = status, path = %path, message = %message, "Secret store rejected request");
    SecretsError::status(status, path, message)
}

/// Map a `vaultrs` error for a request against `path`.
fn client_failure(path: &str, err: ClientError) -> SecretsError {
    match err {
        ClientError::APIError { code, errors } => rejected(path, code, errors),
        ClientError::RestClientError { .. } => {
            error!(error = %err, path = %path, "Secret store request failed");
            SecretsError::connection_failed(err.to_string())
        }
        other => SecretsError::backend_error(other.to_string()),
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        let response = self.send(Method::GET, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path = %path, "Secret store path absent");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::failure(path, response).await);
        }
        Self::data(response).await
    }

    async fn write(&self, path: &str, body: Value) -> Result<Option<SecretData>> {
        let response = self.send(Method::PUT, path, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(path, response).await);
        }
        Self::data(response).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|e| SecretsError::backend_error(format!("LIST method unavailable: {}", e)))?;
        let response = self.send(method, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::failure(path, response).await);
        }

        let data = Self::data(response).await?;
        let keys = match data.as_ref().and_then(|d| d.get("keys")) {
            None => Vec::new(),
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|k| {
                    k.as_str().map(String::from).ok_or_else(|| {
                        SecretsError::invalid_value(format!("non-string key listed at {}", path))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(SecretsError::invalid_value(format!(
                    "'keys' at {} is not an array",
                    path
                )))
            }
        };
        Ok(keys)
    }

    async fn mount(&self, path: &str, request: &MountRequest) -> Result<MountOutcome> {
        validate_path(path)?;

        let config = EnableEngineDataConfigBuilder::default()
            .max_lease_ttl(request.config.max_lease_ttl.as_str())
            .build()
            .map_err(|e| SecretsError::invalid_value(format!("Invalid mount config: {}", e)))?;
        let mut options = EnableEngineRequestBuilder::default();
        options.description(request.description.as_str()).config(config);

        let enabled =
            vaultrs::sys::mount::enable(self.client.as_ref(), path, &request.engine, Some(&mut options))
                .await;
        match enabled {
            Ok(()) => {
                info!(path = %path, engine = %request.engine, "Mounted secrets engine");
                Ok(MountOutcome::Created)
            }
            Err(ClientError::APIError { code: 400, errors })
                if errors.iter().any(|e| e.contains("already in use")) =>
            {
                debug!(path = %path, "Secrets engine already mounted");
                Ok(MountOutcome::AlreadyMounted)
            }
            Err(e) => Err(client_failure(&format!("sys/mounts/{}", path), e)),
        }
    }

    async fn login_jwt(&self, role: &str, jwt: &SecretString) -> Result<Arc<dyn SecretStore>> {
        let auth = vaultrs::auth::oidc::login(
            self.client.as_ref(),
            JWT_AUTH_MOUNT,
            jwt.expose_secret(),
            Some(role.to_string()),
        )
        .await
        .map_err(|e| {
            let err = client_failure(&format!("auth/{}/login", JWT_AUTH_MOUNT), e);
            SecretsError::authentication_failed(format!(
                "JWT login for role '{}' refused: {}",
                role, err
            ))
        })?;

        if auth.client_token.is_empty() {
            return Err(SecretsError::authentication_failed(
                "JWT login response carried no client token",
            ));
        }

        debug!(role = %role, policies = ?auth.policies, "Obtained principal-scoped secret store session");
        let session = Self::connect(
            self.connection.clone(),
            self.http.clone(),
            SecretString::new(auth.client_token),
        )?;
        Ok(Arc::new(session))
    }

    async fn health(&self) -> Result<()> {
        match vaultrs::sys::health(self.client.as_ref()).await {
            Ok(health) if health.sealed => {
                Err(SecretsError::connection_failed("secret store is sealed"))
            }
            Ok(_) => Ok(()),
            // Standby and performance-standby nodes still serve reads
            Err(ClientError::APIError { code: 429 | 472 | 473, .. }) => Ok(()),
            Err(ClientError::APIError { code: 503, .. }) => {
                Err(SecretsError::connection_failed("secret store is sealed"))
            }
            Err(e) => Err(client_failure("sys/health", e)),
        }
    }
}
