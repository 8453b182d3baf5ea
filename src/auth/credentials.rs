//! Password verification against the user database.

use super::hashing::{verify_dummy, verify_password};
use super::{AuthError, Result};
use crate::config::DatabaseConfig;
use crate::identity::Principal;
use crate::secrets::SecretString;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::{debug, instrument, warn};

/// Checks a username/password pair.
///
/// `Ok(false)` means the credentials are wrong (or the user is unknown);
/// `Err` means the user store itself could not answer.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + Debug {
    async fn verify(&self, principal: &Principal, password: &SecretString) -> Result<bool>;
}

/// Verifier backed by the `users` table (`uid`, `pwd`).
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Build a lazily connecting pool so startup does not block on the database.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect_lazy(&config.url)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to configure user database pool");
                AuthError::Persistence(e.to_string())
            })?;
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn stored_hash(&self, principal: &Principal) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT pwd FROM users WHERE uid = $1")
            .bind(principal.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, principal = %principal, "User lookup failed");
                AuthError::from(e)
            })?;
        Ok(row.map(|(hash,)| hash))
    }
}

#[async_trait]
impl CredentialVerifier for PgCredentialStore {
    #[instrument(skip(self, principal, password), fields(principal = %principal))]
    async fn verify(&self, principal: &Principal, password: &SecretString) -> Result<bool> {
        let Some(hash) = self.stored_hash(principal).await? else {
            verify_dummy(password.expose_secret());
            debug!("Unknown user");
            return Ok(false);
        };

        let matched = verify_password(password.expose_secret(), &hash);
        if !matched {
            warn!("Password mismatch");
        }
        Ok(matched)
    }
}

/// Fixed user table held in memory. Passwords are stored as hashes, the same
/// way the database holds them.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an already hashed password (argon2 PHC or bcrypt).
    pub fn with_hash(mut self, username: impl Into<String>, hash: impl Into<String>) -> Self {
        self.users.insert(username.into(), hash.into());
        self
    }

    /// Add a user with a plaintext password, hashed on insert.
    pub fn with_password(self, username: impl Into<String>, password: &str) -> Self {
        match super::hashing::hash_password(password) {
            Ok(hash) => self.with_hash(username, hash),
            Err(e) => {
                warn!(error = %e, "Failed to hash static credential; user not added");
                self
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, principal: &Principal, password: &SecretString) -> Result<bool> {
        match self.users.get(principal.as_str()) {
            Some(hash) => Ok(verify_password(password.expose_secret(), hash)),
            None => {
                verify_dummy(password.expose_secret());
                Ok(false)
            }
        }
    }
}
