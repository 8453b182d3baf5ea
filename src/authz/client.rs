//! Authz Server capability and its Hydra admin API client.

use super::types::{
    AcceptConsentRequest, AcceptLoginRequest, ConsentChallenge, ErrorResponse, LoginChallenge,
    RedirectResponse,
};
use super::{AuthzError, Result};
use crate::config::AuthzConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, error, warn};

/// Challenge fetch/accept operations of the Authz Server.
///
/// The broker holds no challenge state; replayed or expired challenges are
/// rejected by the server and surface as [`AuthzError::Status`].
#[async_trait]
pub trait AuthzServer: Send + Sync + Debug {
    async fn get_login(&self, challenge: &str) -> Result<LoginChallenge>;

    async fn accept_login(
        &self,
        challenge: &str,
        request: &AcceptLoginRequest,
    ) -> Result<RedirectResponse>;

    async fn get_consent(&self, challenge: &str) -> Result<ConsentChallenge>;

    async fn accept_consent(
        &self,
        challenge: &str,
        request: &AcceptConsentRequest,
    ) -> Result<RedirectResponse>;
}

const LOGIN_PATH: &str = "/oauth2/auth/requests/login";
const LOGIN_ACCEPT_PATH: &str = "/oauth2/auth/requests/login/accept";
const CONSENT_PATH: &str = "/oauth2/auth/requests/consent";
const CONSENT_ACCEPT_PATH: &str = "/oauth2/auth/requests/consent/accept";

/// Client for Ory Hydra's admin API.
#[derive(Clone)]
pub struct HydraAdminClient {
    http: reqwest::Client,
    admin_url: String,
}

impl Debug for HydraAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HydraAdminClient")
            .field("admin_url", &self.admin_url)
            .field("http", &"[reqwest::Client]")
            .finish()
    }
}

impl HydraAdminClient {
    pub fn new(config: &AuthzConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!(admin_url = %config.admin_url, "TLS verification disabled for Authz Server admin API");
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| AuthzError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(http, &config.admin_url))
    }

    pub fn with_client(http: reqwest::Client, admin_url: &str) -> Self {
        Self { http, admin_url: admin_url.trim_end_matches('/').to_string() }
    }

    fn request(&self, method: Method, path: &str, param: &str, challenge: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.admin_url, path)).query(&[(param, challenge)])
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let response = builder.send().await.map_err(|e| {
            error!(endpoint = endpoint, error = %e, "Authz Server request failed");
            AuthzError::transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            let message = match (body.error.is_empty(), body.error_description.is_empty()) {
                (true, _) => status.canonical_reason().unwrap_or("request failed").to_string(),
                (false, true) => body.error,
                (false, false) => format!("{}: {}", body.error, body.error_description),
            };
            warn!(endpoint = endpoint, status = status.as_u16(), message = %message, "Authz Server rejected request");
            return Err(AuthzError::Status { endpoint, status: status.as_u16(), message });
        }

        response.json::<T>().await.map_err(|e| AuthzError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    async fn put<B: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        path: &str,
        param: &str,
        challenge: &str,
        body: &B,
    ) -> Result<RedirectResponse> {
        let builder = self.request(Method::PUT, path, param, challenge).json(body);
        let redirect: RedirectResponse = self.execute(endpoint, builder).await?;
        if redirect.redirect_to.is_empty() {
            return Err(AuthzError::Decode { endpoint, message: "empty redirect_to".to_string() });
        }
        debug!(endpoint = endpoint, "Challenge accepted");
        Ok(redirect)
    }
}

#[async_trait]
impl AuthzServer for HydraAdminClient {
    async fn get_login(&self, challenge: &str) -> Result<LoginChallenge> {
        let builder = self.request(Method::GET, LOGIN_PATH, "login_challenge", challenge);
        self.execute("get_login", builder).await
    }

    async fn accept_login(
        &self,
        challenge: &str,
        request: &AcceptLoginRequest,
    ) -> Result<RedirectResponse> {
        self.put("accept_login", LOGIN_ACCEPT_PATH, "login_challenge", challenge, request).await
    }

    async fn get_consent(&self, challenge: &str) -> Result<ConsentChallenge> {
        let builder = self.request(Method::GET, CONSENT_PATH, "consent_challenge", challenge);
        self.execute("get_consent", builder).await
    }

    async fn accept_consent(
        &self,
        challenge: &str,
        request: &AcceptConsentRequest,
    ) -> Result<RedirectResponse> {
        self.put("accept_consent", CONSENT_ACCEPT_PATH, "consent_challenge", challenge, request)
            .await
    }
}
