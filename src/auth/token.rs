//! Bearer token validation.
//!
//! Access tokens presented to `/cert` are JWTs signed by the OIDC issuer.
//! [`OidcTokenValidator`] discovers the issuer's key set, caches it for the
//! configured TTL and refetches when a token names a key it has not seen.

use super::{AuthError, Result};
use crate::config::OidcConfig;
use crate::identity::Principal;
use crate::secrets::SecretString;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

lazy_static! {
    static ref BEARER_REGEX: Regex =
        Regex::new(r"^[Bb]earer ([^\s]+)$").expect("bearer regex should compile");
}

/// Extract the token from an `Authorization: Bearer <jwt>` header value.
pub fn parse_bearer(header: &str) -> Result<SecretString> {
    let header = header.trim();
    if header.is_empty() {
        return Err(AuthError::MissingBearer);
    }
    BEARER_REGEX
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| SecretString::new(m.as_str()))
        .ok_or(AuthError::MalformedBearer)
}

/// Turns a bearer token into the principal it was issued to.
#[async_trait]
pub trait TokenValidator: Send + Sync + Debug {
    async fn validate(&self, token: &SecretString) -> Result<Principal>;
}

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Validates issuer-signed JWTs (`iss`, `aud`, `exp`, signature) and maps
/// `sub` to a [`Principal`].
pub struct OidcTokenValidator {
    http: reqwest::Client,
    issuer: String,
    audience: String,
    cache_ttl: Duration,
    keys: RwLock<Option<CachedKeys>>,
}

impl Debug for OidcTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcTokenValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl OidcTokenValidator {
    pub fn new(config: &OidcConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Discovery(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &OidcConfig) -> Self {
        Self {
            http,
            issuer: config.issuer.clone(),
            audience: config.client_id.clone(),
            cache_ttl: config.jwks_cache_ttl(),
            keys: RwLock::new(None),
        }
    }

    fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.issuer.trim_end_matches('/'))
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Issuer request failed");
            AuthError::Discovery(e.to_string())
        })?;
        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{} returned {}",
                url,
                response.status().as_u16()
            )));
        }
        response.json::<T>().await.map_err(|e| AuthError::Discovery(e.to_string()))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet> {
        let metadata: ProviderMetadata = self.fetch_json(&self.discovery_url()).await?;
        let jwks: JwkSet = self.fetch_json(&metadata.jwks_uri).await?;
        debug!(keys = jwks.keys.len(), "Fetched issuer key set");
        Ok(jwks)
    }

    async fn cached_key(&self, kid: Option<&str>) -> Option<Jwk> {
        let guard = self.keys.read().await;
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() >= self.cache_ttl {
            return None;
        }
        select_key(&cached.jwks, kid).cloned()
    }

    /// Look the key up in the cache, refetching once on a miss or expiry.
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk> {
        if let Some(jwk) = self.cached_key(kid).await {
            return Ok(jwk);
        }

        let jwks = self.fetch_jwks().await?;
        let found = select_key(&jwks, kid).cloned();
        *self.keys.write().await = Some(CachedKeys { jwks, fetched_at: Instant::now() });
        found.ok_or_else(|| AuthError::InvalidToken("unknown signing key".to_string()))
    }
}

/// With a `kid`, the matching key; without one, the key set's only key.
fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

#[async_trait]
impl TokenValidator for OidcTokenValidator {
    #[instrument(skip(self, token))]
    async fn validate(&self, token: &SecretString) -> Result<Principal> {
        let header = decode_header(token.expose_secret())?;
        if !is_asymmetric(header.alg) {
            warn!(alg = ?header.alg, "Rejected token with symmetric algorithm");
            return Err(AuthError::InvalidToken("unsupported algorithm".to_string()));
        }

        let jwk = self.key_for(header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str(), self.issuer.trim_end_matches('/')]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<Claims>(token.expose_secret(), &key, &validation).map_err(|e| {
            debug!(error = %e, "Token rejected");
            AuthError::from(e)
        })?;

        Principal::parse(&data.claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a valid principal".to_string()))
    }
}

/// Fixed token-to-principal table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &SecretString) -> Result<Principal> {
        self.tokens
            .get(token.expose_secret())
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Signer {
        kid: String,
        encoding: EncodingKey,
        jwk: Value,
    }

    impl Signer {
        fn generate(kid: &str) -> Self {
            let pair = rcgen::KeyPair::generate().unwrap();
            let raw = pair.public_key_raw();
            let encoding = EncodingKey::from_ec_pem(pair.serialize_pem().as_bytes()).unwrap();
            let jwk = json!({
                "kty": "EC",
                "crv": "P-256",
                "x": URL_SAFE_NO_PAD.encode(&raw[1..33]),
                "y": URL_SAFE_NO_PAD.encode(&raw[33..65]),
                "kid": kid,
                "alg": "ES256",
                "use": "sig"
            });
            Self { kid: kid.to_string(), encoding, jwk }
        }

        fn sign(&self, claims: Value) -> SecretString {
            let mut header = Header::new(Algorithm::ES256);
            header.kid = Some(self.kid.clone());
            SecretString::new(encode(&header, &claims, &self.encoding).unwrap())
        }
    }

    fn claims(issuer: &str, audience: &str, sub: &str) -> Value {
        json!({
            "iss": issuer,
            "aud": audience,
            "sub": sub,
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }

    async fn issuer(keys: Vec<Value>, jwks_fetches: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": format!("{}/", server.uri()),
                "jwks_uri": format!("{}/.well-known/jwks.json", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(jwks_fetches)
            .mount(&server)
            .await;
        server
    }

    fn validator(server: &MockServer) -> OidcTokenValidator {
        let config = OidcConfig { issuer: format!("{}/", server.uri()), ..OidcConfig::default() };
        OidcTokenValidator::with_client(reqwest::Client::new(), &config)
    }

    #[test]
    fn parses_bearer_headers() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap().expose_secret(), "abc.def.ghi");
        assert_eq!(parse_bearer("bearer tok").unwrap().expose_secret(), "tok");
        assert!(matches!(parse_bearer(""), Err(AuthError::MissingBearer)));
        assert!(matches!(parse_bearer("Basic dXNlcg=="), Err(AuthError::MalformedBearer)));
        assert!(matches!(parse_bearer("Bearer a b"), Err(AuthError::MalformedBearer)));
    }

    #[tokio::test]
    async fn valid_token_maps_to_principal_and_keys_are_cached() {
        let signer = Signer::generate("k1");
        let server = issuer(vec![signer.jwk.clone()], 1).await;
        let validator = validator(&server);
        let iss = format!("{}/", server.uri());

        let token = signer.sign(claims(&iss, "fadalax-frontend", "alice"));
        assert_eq!(validator.validate(&token).await.unwrap().as_str(), "alice");
        assert_eq!(validator.validate(&token).await.unwrap().as_str(), "alice");
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let signer = Signer::generate("k1");
        let server = issuer(vec![signer.jwk.clone()], 1).await;
        let iss = format!("{}/", server.uri());

        let token = signer.sign(claims(&iss, "someone-else", "alice"));
        let err = validator(&server).validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn subject_must_be_a_principal() {
        let signer = Signer::generate("k1");
        let server = issuer(vec![signer.jwk.clone()], 1).await;
        let iss = format!("{}/", server.uri());

        let token = signer.sign(claims(&iss, "fadalax-frontend", "al ice"));
        let err = validator(&server).validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn symmetric_tokens_are_rejected_before_key_lookup() {
        let server = issuer(vec![], 0).await;
        let iss = format!("{}/", server.uri());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims(&iss, "fadalax-frontend", "alice"),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let err = validator(&server).validate(&SecretString::new(token)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn unknown_kid_triggers_refetch() {
        let first = Signer::generate("k1");
        let second = Signer::generate("k2");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jwks_uri": format!("{}/keys", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/keys"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [first.jwk.clone()] })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "keys": [first.jwk.clone(), second.jwk.clone()] }),
            ))
            .mount(&server)
            .await;

        let validator = validator(&server);
        let iss = format!("{}/", server.uri());
        let a = first.sign(claims(&iss, "fadalax-frontend", "alice"));
        let b = second.sign(claims(&iss, "fadalax-frontend", "bob"));

        assert_eq!(validator.validate(&a).await.unwrap().as_str(), "alice");
        assert_eq!(validator.validate(&b).await.unwrap().as_str(), "bob");
    }

    #[tokio::test]
    async fn unreachable_issuer_is_a_discovery_error() {
        let server = MockServer::start().await;
        let signer = Signer::generate("k1");
        let iss = format!("{}/", server.uri());
        let token = signer.sign(claims(&iss, "fadalax-frontend", "alice"));

        let err = validator(&server).validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Discovery(_)));
    }

    #[tokio::test]
    async fn static_validator_knows_only_its_tokens() {
        let validator =
            StaticTokenValidator::new().with_token("t1", Principal::parse("alice").unwrap());
        assert_eq!(validator.validate(&"t1".into()).await.unwrap().as_str(), "alice");
        assert!(validator.validate(&"t2".into()).await.is_err());
    }
}
