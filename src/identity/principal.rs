//! Validated username shared by the Authz Server, the Secret Store and the
//! user database.
//!
//! A [`Principal`] is interpolated into Secret Store paths and policy names
//! (`pki-user/<p>`, `kv-user/<p>/*`), so [`Principal::parse`] is the only way
//! to obtain one.

use super::{IdentityError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

lazy_static! {
    static ref PRINCIPAL_REGEX: Regex = Regex::new(r"^[[:alnum:]]+$")
        .expect("PRINCIPAL_REGEX should be a valid regex pattern");
}

/// Canonical alphanumeric username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Validate a raw username.
    pub fn parse(raw: &str) -> Result<Self> {
        if PRINCIPAL_REGEX.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(IdentityError::invalid_principal(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Principal {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Deserialization goes through `parse` so that wire input cannot bypass validation.
impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Principal::parse(&raw).map_err(serde::de::Error::custom)
    }
}
