//! In-memory [`SecretStore`] for tests and local development.
//!
//! Writes are stored and readable afterwards, so existence probes behave like
//! the real store. Responses for endpoints that compute data (issue, sign,
//! generate) are canned per path. Every call is recorded for assertions, and
//! failures can be injected per operation and path prefix.

use super::error::{Result, SecretsError};
use super::store::{validate_path, SecretStore};
use super::types::{MountOutcome, MountRequest, SecretData, SecretString};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operation kinds recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Read,
    Write,
    List,
    Mount,
    Login,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub path: String,
    pub body: Option<Value>,
    /// Role of the session that made the call; `None` for the root session
    pub session: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, SecretData>,
    write_responses: HashMap<String, SecretData>,
    listings: HashMap<String, Vec<String>>,
    mounts: HashMap<String, MountRequest>,
    failures: Vec<(StoreOp, String)>,
    logins: HashMap<String, String>,
    calls: Vec<StoreCall>,
}

/// Shared-state in-memory store. Clones and scoped sessions see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretStore {
    state: Arc<Mutex<State>>,
    session: Option<String>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the log from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed data readable at `path`.
    pub fn insert(&self, path: impl Into<String>, data: Value) {
        let data = as_object(data);
        self.lock().entries.insert(path.into(), data);
    }

    /// Return `data` from every write to `path` instead of echoing nothing.
    pub fn respond_to_write(&self, path: impl Into<String>, data: Value) {
        let data = as_object(data);
        self.lock().write_responses.insert(path.into(), data);
    }

    /// Seed the keys returned when listing `path`.
    pub fn set_listing(&self, path: impl Into<String>, keys: Vec<String>) {
        self.lock().listings.insert(path.into(), keys);
    }

    /// Make `op` fail for every path starting with `prefix`.
    pub fn fail_on(&self, op: StoreOp, prefix: impl Into<String>) {
        self.lock().failures.push((op, prefix.into()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Accept `jwt` for logins to `role`. Without a registration every login is refused.
    pub fn allow_login(&self, role: impl Into<String>, jwt: impl Into<String>) {
        self.lock().logins.insert(role.into(), jwt.into());
    }

    pub fn get(&self, path: &str) -> Option<SecretData> {
        self.lock().entries.get(path).cloned()
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.lock().mounts.contains_key(path)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls of kind `op`.
    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Paths of recorded calls of kind `op`, in call order.
    pub fn paths(&self, op: StoreOp) -> Vec<String> {
        self.lock().calls.iter().filter(|c| c.op == op).map(|c| c.path.clone()).collect()
    }

    fn record(&self, op: StoreOp, path: &str, body: Option<&Value>) -> Result<()> {
        validate_path(path)?;
        let mut state = self.lock();
        state.calls.push(StoreCall {
            op,
            path: path.to_string(),
            body: body.cloned(),
            session: self.session.clone(),
        });
        if state.failures.iter().any(|(f_op, prefix)| *f_op == op && path.starts_with(prefix)) {
            return Err(SecretsError::status(500, path, "injected failure"));
        }
        Ok(())
    }
}

fn as_object(value: Value) -> SecretData {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = SecretData::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        self.record(StoreOp::Read, path, None)?;
        Ok(self.lock().entries.get(path).cloned())
    }

    async fn write(&self, path: &str, body: Value) -> Result<Option<SecretData>> {
        self.record(StoreOp::Write, path, Some(&body))?;
        let mut state = self.lock();
        state.entries.insert(path.to_string(), as_object(body));
        Ok(state.write_responses.get(path).cloned())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        self.record(StoreOp::List, path, None)?;
        let state = self.lock();
        if let Some(keys) = state.listings.get(path) {
            return Ok(keys.clone());
        }

        // Direct children of `path`, like a LIST on a KV mount
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut keys: Vec<String> = state
            .entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((dir, _)) => format!("{}/", dir),
                None => rest.to_string(),
            })
            .collect();
        keys.dedup();
        Ok(keys)
    }

    async fn mount(&self, path: &str, request: &MountRequest) -> Result<MountOutcome> {
        let body = serde_json::to_value(request)?;
        self.record(StoreOp::Mount, path, Some(&body))?;
        let mut state = self.lock();
        if state.mounts.contains_key(path) {
            return Ok(MountOutcome::AlreadyMounted);
        }
        state.mounts.insert(path.to_string(), request.clone());
        Ok(MountOutcome::Created)
    }

    async fn login_jwt(&self, role: &str, jwt: &SecretString) -> Result<Arc<dyn SecretStore>> {
        self.record(StoreOp::Login, &format!("auth/jwt/login/{}", role), None)?;
        let accepted = self.lock().logins.get(role).is_some_and(|t| t == jwt.expose_secret());
        if !accepted {
            return Err(SecretsError::authentication_failed(format!(
                "JWT login for role '{}' refused",
                role
            )));
        }
        Ok(Arc::new(Self { state: Arc::clone(&self.state), session: Some(role.to_string()) }))
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
