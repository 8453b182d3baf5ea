//! Value types shared by Secret Store implementations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The `data` object of a Secret Store response.
pub type SecretData = Map<String, Value>;

/// Store tokens, bearer JWTs, passwords and private keys.
///
/// Debug, Display and Serialize all print `[REDACTED]`; the value is only
/// reachable through [`SecretString::expose_secret`]. The buffer is zeroed on
/// drop.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Secrets engine mount request (`POST sys/mounts/<path>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountRequest {
    #[serde(rename = "type")]
    pub engine: String,
    pub description: String,
    pub config: MountConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountConfig {
    pub max_lease_ttl: String,
}

impl MountRequest {
    pub fn new(
        engine: impl Into<String>,
        description: impl Into<String>,
        max_lease_ttl: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.into(),
            description: description.into(),
            config: MountConfig { max_lease_ttl: max_lease_ttl.into() },
        }
    }
}

/// Result of a mount request. An existing mount is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Created,
    AlreadyMounted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_never_prints_value() {
        let secret = SecretString::new("hvs.supersecret");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[REDACTED]\"");
        assert_eq!(secret.expose_secret(), "hvs.supersecret");
    }

    #[test]
    fn secret_string_deserializes_raw_value() {
        let secret: SecretString = serde_json::from_str("\"s3cret\"").unwrap();
        assert_eq!(secret.expose_secret(), "s3cret");
    }

    #[test]
    fn mount_request_wire_shape() {
        let req = MountRequest::new("pki", "PKI for alice", "43800h");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "pki",
                "description": "PKI for alice",
                "config": { "max_lease_ttl": "43800h" }
            })
        );
    }
}
