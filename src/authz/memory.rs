//! In-memory [`AuthzServer`] double.

use super::client::AuthzServer;
use super::types::{
    AcceptConsentRequest, AcceptLoginRequest, ConsentChallenge, LoginChallenge, RedirectResponse,
};
use super::{AuthzError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    logins: HashMap<String, LoginChallenge>,
    consents: HashMap<String, ConsentChallenge>,
    accepted_logins: Vec<(String, AcceptLoginRequest)>,
    accepted_consents: Vec<(String, AcceptConsentRequest)>,
}

/// Challenge store that mimics single-use challenges: accepting removes the
/// pending request, so a replay fails like it would upstream.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthzServer {
    state: Arc<Mutex<State>>,
}

impl InMemoryAuthzServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_login(&self, challenge: impl Into<String>, login: LoginChallenge) {
        self.lock().logins.insert(challenge.into(), login);
    }

    pub fn add_consent(&self, challenge: impl Into<String>, consent: ConsentChallenge) {
        self.lock().consents.insert(challenge.into(), consent);
    }

    pub fn accepted_logins(&self) -> Vec<(String, AcceptLoginRequest)> {
        self.lock().accepted_logins.clone()
    }

    pub fn accepted_consents(&self) -> Vec<(String, AcceptConsentRequest)> {
        self.lock().accepted_consents.clone()
    }

    /// Redirect URL handed out when `challenge` is accepted.
    pub fn redirect_for(challenge: &str) -> String {
        format!("https://hydra.test/oauth2/auth?verifier={}", challenge)
    }
}

fn unknown(endpoint: &'static str) -> AuthzError {
    AuthzError::Status {
        endpoint,
        status: 404,
        message: "Not Found".to_string(),
    }
}

#[async_trait]
impl AuthzServer for InMemoryAuthzServer {
    async fn get_login(&self, challenge: &str) -> Result<LoginChallenge> {
        self.lock().logins.get(challenge).cloned().ok_or_else(|| unknown("get_login"))
    }

    async fn accept_login(
        &self,
        challenge: &str,
        request: &AcceptLoginRequest,
    ) -> Result<RedirectResponse> {
        let mut state = self.lock();
        state.logins.remove(challenge).ok_or_else(|| unknown("accept_login"))?;
        state.accepted_logins.push((challenge.to_string(), request.clone()));
        Ok(RedirectResponse { redirect_to: Self::redirect_for(challenge) })
    }

    async fn get_consent(&self, challenge: &str) -> Result<ConsentChallenge> {
        self.lock().consents.get(challenge).cloned().ok_or_else(|| unknown("get_consent"))
    }

    async fn accept_consent(
        &self,
        challenge: &str,
        request: &AcceptConsentRequest,
    ) -> Result<RedirectResponse> {
        let mut state = self.lock();
        state.consents.remove(challenge).ok_or_else(|| unknown("accept_consent"))?;
        state.accepted_consents.push((challenge.to_string(), request.clone()));
        Ok(RedirectResponse { redirect_to: Self::redirect_for(challenge) })
    }
}
