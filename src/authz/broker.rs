//! Login and consent challenge resolution.
//!
//! The broker keeps no per-challenge state. Every call fetches the pending
//! request from the Authz Server, decides it, and accepts it; a replayed
//! challenge is refused upstream.

use super::client::AuthzServer;
use super::types::{AcceptConsentRequest, AcceptLoginRequest};
use super::AuthzError;
use crate::auth::CredentialVerifier;
use crate::config::AppConfig;
use crate::errors::{Error, Result};
use crate::identity::{IdentityParser, Principal};
use crate::observability::metrics;
use crate::pki::{ProvisioningManager, ProvisioningSettings, RevocationValidator};
use crate::secrets::{SecretStore, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How the caller tries to authenticate a login challenge.
#[derive(Debug, Clone)]
pub enum LoginAttempt {
    /// Page load: the proxy's identity and serial headers, possibly empty
    Certificate { identity_header: String, serial_header: String },
    /// Form submission
    Password { username: String, password: SecretString },
}

impl LoginAttempt {
    pub fn method(&self) -> &'static str {
        match self {
            LoginAttempt::Certificate { .. } => "certificate",
            LoginAttempt::Password { .. } => "password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The challenge was accepted and the environment provisioned
    Accepted { principal: Principal, redirect_to: String },
    /// No trusted certificate; show the password form
    PromptCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentAction {
    View,
    /// `scopes` is the subset the user selected; `None` grants everything requested
    Submit { scopes: Option<Vec<String>> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted { redirect_to: String },
    PromptConsent { subject: String, requested_scope: Vec<String> },
}

/// Requested scopes, narrowed to `selected` when given. Request order is kept
/// and selections the client never asked for are dropped.
pub fn granted_scope(requested: &[String], selected: Option<&[String]>) -> Vec<String> {
    match selected {
        None => requested.to_vec(),
        Some(selected) => requested.iter().filter(|s| selected.contains(s)).cloned().collect(),
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeBroker {
    authz: Arc<dyn AuthzServer>,
    parser: IdentityParser,
    revocation: RevocationValidator,
    credentials: Arc<dyn CredentialVerifier>,
    provisioning: ProvisioningManager,
}

impl ChallengeBroker {
    pub fn new(
        authz: Arc<dyn AuthzServer>,
        parser: IdentityParser,
        revocation: RevocationValidator,
        credentials: Arc<dyn CredentialVerifier>,
        provisioning: ProvisioningManager,
    ) -> Self {
        Self { authz, parser, revocation, credentials, provisioning }
    }

    /// Wire the broker from configuration. `store` is the privileged Secret
    /// Store session used for revocation lookups and provisioning.
    pub fn from_config(
        config: &AppConfig,
        authz: Arc<dyn AuthzServer>,
        store: Arc<dyn SecretStore>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        let parser = IdentityParser::new(&config.identity.domain)?;
        let revocation = RevocationValidator::new(
            store.clone(),
            config.vault.root_mount.clone(),
            config.identity.admin_principal.clone(),
        );
        let provisioning = ProvisioningManager::new(store, ProvisioningSettings::from_config(config));
        Ok(Self::new(authz, parser, revocation, credentials, provisioning))
    }

    #[instrument(skip(self, attempt), fields(challenge = %challenge, method = attempt.method()))]
    pub async fn resolve_login(&self, challenge: &str, attempt: LoginAttempt) -> Result<LoginOutcome> {
        let method = attempt.method();
        let result = self.login(challenge, attempt).await;
        let outcome = match &result {
            Ok(LoginOutcome::Accepted { .. }) => "accepted",
            Ok(LoginOutcome::PromptCredentials) | Err(Error::Unauthenticated(_)) => "rejected",
            Err(_) => "error",
        };
        metrics::record_login(method, outcome);
        result
    }

    async fn login(&self, challenge: &str, attempt: LoginAttempt) -> Result<LoginOutcome> {
        if challenge.is_empty() {
            return Err(Error::validation("missing login challenge"));
        }
        let request = self.authz.get_login(challenge).await.map_err(|e| {
            warn!(error = %e, "Failed to fetch login request");
            Error::from(e)
        })?;

        let principal = if request.skip {
            debug!(subject = %request.subject, "Authz Server skipped authentication");
            let principal = Principal::parse(&request.subject)
                .map_err(|_| AuthzError::InvalidSubject(request.subject.clone()))?;
            Some(principal)
        } else {
            match &attempt {
                LoginAttempt::Certificate { identity_header, serial_header } => {
                    self.authenticate_certificate(identity_header, serial_header, &request.subject)
                        .await
                }
                LoginAttempt::Password { username, password } => {
                    self.authenticate_password(username, password).await?
                }
            }
        };

        let Some(principal) = principal else {
            return match attempt {
                LoginAttempt::Certificate { .. } => Ok(LoginOutcome::PromptCredentials),
                LoginAttempt::Password { .. } => Err(Error::unauthenticated("invalid credentials")),
            };
        };

        let redirect = self
            .authz
            .accept_login(challenge, &AcceptLoginRequest::for_subject(principal.as_str()))
            .await
            .map_err(|e| {
                warn!(principal = %principal, error = %e, "Failed to accept login request");
                Error::from(e)
            })?;

        self.provisioning.ensure_provisioned(&principal).await?;

        info!(principal = %principal, "Login accepted");
        Ok(LoginOutcome::Accepted { principal, redirect_to: redirect.redirect_to })
    }

    /// Fail closed: every problem along the certificate path means "not
    /// authenticated" and is only visible in the logs.
    async fn authenticate_certificate(
        &self,
        identity_header: &str,
        serial_header: &str,
        hint: &str,
    ) -> Option<Principal> {
        let identity = match self.parser.identify(identity_header, serial_header, hint) {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!("No trusted certificate identity presented");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Rejecting certificate identity");
                return None;
            }
        };

        match self.revocation.is_valid(&identity).await {
            Ok(true) => Some(identity.principal),
            Ok(false) => {
                warn!(principal = %identity.principal, serial = %identity.serial, "Certificate is revoked");
                None
            }
            Err(e) => {
                warn!(principal = %identity.principal, error = %e, "Revocation check failed");
                None
            }
        }
    }

    async fn authenticate_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<Principal>> {
        let Ok(principal) = Principal::parse(username) else {
            debug!("Username is not a valid principal");
            return Ok(None);
        };
        let verified = self.credentials.verify(&principal, password).await?;
        Ok(verified.then_some(principal))
    }

    #[instrument(skip(self, action), fields(challenge = %challenge))]
    pub async fn resolve_consent(
        &self,
        challenge: &str,
        action: ConsentAction,
    ) -> Result<ConsentOutcome> {
        let result = self.consent(challenge, action).await;
        let outcome = match &result {
            Ok(ConsentOutcome::Granted { .. }) => "granted",
            Ok(ConsentOutcome::PromptConsent { .. }) => "prompted",
            Err(_) => "error",
        };
        metrics::record_consent(outcome);
        result
    }

    async fn consent(&self, challenge: &str, action: ConsentAction) -> Result<ConsentOutcome> {
        if challenge.is_empty() {
            return Err(Error::validation("missing consent challenge"));
        }
        let request = self.authz.get_consent(challenge).await.map_err(|e| {
            warn!(error = %e, "Failed to fetch consent request");
            Error::from(e)
        })?;

        let selected = match action {
            ConsentAction::View if !request.skip => {
                return Ok(ConsentOutcome::PromptConsent {
                    subject: request.subject,
                    requested_scope: request.requested_scope,
                });
            }
            ConsentAction::View => None,
            ConsentAction::Submit { scopes } => scopes,
        };

        let grant = AcceptConsentRequest::grant(
            granted_scope(&request.requested_scope, selected.as_deref()),
            request.requested_access_token_audience,
        );
        let redirect = self.authz.accept_consent(challenge, &grant).await.map_err(|e| {
            warn!(subject = %request.subject, error = %e, "Failed to accept consent request");
            Error::from(e)
        })?;

        info!(subject = %request.subject, scopes = ?grant.grant_scope, "Consent granted");
        Ok(ConsentOutcome::Granted { redirect_to: redirect.redirect_to })
    }
}
