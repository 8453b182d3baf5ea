//! Wire types of the Authz Server's login/consent admin API.

use serde::{Deserialize, Serialize};

/// How long an accepted decision is remembered by the Authz Server, in seconds.
pub const REMEMBER_FOR_SECONDS: i64 = 300;

/// Pending login request (`GET /oauth2/auth/requests/login`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    /// The Authz Server already authenticated this subject; no credentials needed
    #[serde(default)]
    pub skip: bool,
    /// Empty when the user has no session yet
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requested_scope: Vec<String>,
}

/// Pending consent request (`GET /oauth2/auth/requests/consent`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentChallenge {
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requested_scope: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requested_access_token_audience: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptLoginRequest {
    pub subject: String,
    pub remember: bool,
    pub remember_for: i64,
}

impl AcceptLoginRequest {
    /// Login acceptance is never remembered; every login goes through the broker.
    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), remember: false, remember_for: REMEMBER_FOR_SECONDS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptConsentRequest {
    pub grant_scope: Vec<String>,
    pub grant_access_token_audience: Vec<String>,
    pub remember: bool,
    pub remember_for: i64,
}

impl AcceptConsentRequest {
    pub fn grant(scope: Vec<String>, audience: Vec<String>) -> Self {
        Self {
            grant_scope: scope,
            grant_access_token_audience: audience,
            remember: true,
            remember_for: REMEMBER_FOR_SECONDS,
        }
    }
}

/// Response of both accept endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub redirect_to: String,
}

/// Error body returned by the admin API.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_challenge_tolerates_missing_and_null_fields() {
        let c: LoginChallenge = serde_json::from_value(json!({
            "challenge": "abc",
            "skip": false,
            "subject": "",
            "requested_scope": null,
            "client": { "client_id": "fadalax-frontend" }
        }))
        .unwrap();
        assert_eq!(c, LoginChallenge::default());
    }

    #[test]
    fn consent_challenge_fields() {
        let c: ConsentChallenge = serde_json::from_value(json!({
            "skip": true,
            "subject": "alice",
            "requested_scope": ["openid", "offline"],
            "requested_access_token_audience": ["vault"]
        }))
        .unwrap();
        assert!(c.skip);
        assert_eq!(c.requested_scope, vec!["openid", "offline"]);
        assert_eq!(c.requested_access_token_audience, vec!["vault"]);
    }

    #[test]
    fn accept_bodies() {
        assert_eq!(
            serde_json::to_value(AcceptLoginRequest::for_subject("alice")).unwrap(),
            json!({ "subject": "alice", "remember": false, "remember_for": 300 })
        );
        assert_eq!(
            serde_json::to_value(AcceptConsentRequest::grant(vec!["openid".into()], vec![]))
                .unwrap(),
            json!({
                "grant_scope": ["openid"],
                "grant_access_token_audience": [],
                "remember": true,
                "remember_for": 300
            })
        );
    }
}
