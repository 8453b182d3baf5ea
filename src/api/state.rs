use std::sync::Arc;

use crate::auth::{CredentialVerifier, TokenValidator};
use crate::authz::{AuthzServer, ChallengeBroker};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::pki::CertificateLifecycle;
use crate::secrets::SecretStore;

/// Shared handler state. Everything inside is immutable or internally
/// synchronized, so cloning per request is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Arc<ChallengeBroker>,
    pub lifecycle: Arc<CertificateLifecycle>,
    /// Privileged session, used for health checks and bearer token exchange
    pub store: Arc<dyn SecretStore>,
    pub tokens: Arc<dyn TokenValidator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        authz: Arc<dyn AuthzServer>,
        store: Arc<dyn SecretStore>,
        credentials: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenValidator>,
    ) -> Result<Self> {
        let broker = ChallengeBroker::from_config(&config, authz, store.clone(), credentials)?;
        let lifecycle = CertificateLifecycle::from_config(&config);
        Ok(Self {
            broker: Arc::new(broker),
            lifecycle: Arc::new(lifecycle),
            store,
            tokens,
            config: Arc::new(config),
        })
    }
}
