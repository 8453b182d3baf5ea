//! # Configuration Settings
//!
//! Defines the configuration structure for the identity bridge. Every section
//! has defaults matching the reference deployment (`fadalax.tech`) and a
//! `from_env` constructor; command-line flags are layered on top in
//! [`crate::cli`].

use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// HTTP listener configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Authz Server admin API
    #[validate(nested)]
    pub authz: AuthzConfig,

    /// Secret Store connection
    #[validate(nested)]
    pub vault: VaultConfig,

    /// Certificate identity and PKI naming
    #[validate(nested)]
    pub identity: IdentityConfig,

    /// Bearer token validation and auth-role parameters
    #[validate(nested)]
    pub oidc: OidcConfig,

    /// User database for password login
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            authz: AuthzConfig::from_env(),
            vault: VaultConfig::from_env(),
            identity: IdentityConfig::from_env(),
            oidc: OidcConfig::from_env(),
            database: DatabaseConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        parse_url("authz.admin_url", &self.authz.admin_url)?;
        parse_url("vault.address", &self.vault.address)?;
        parse_url("oidc.issuer", &self.oidc.issuer)?;
        for uri in &self.oidc.allowed_redirect_uris {
            parse_url("oidc.allowed_redirect_uris", uri)?;
        }

        if self.observability.metrics_port != 0 && self.observability.metrics_port == self.server.port
        {
            return Err(Error::config("Server and metrics ports cannot be the same"));
        }

        if crate::identity::Principal::parse(&self.identity.admin_principal).is_err() {
            return Err(Error::config("Admin principal must be ASCII alphanumeric"));
        }

        if self.identity.identity_header.eq_ignore_ascii_case(&self.identity.serial_header) {
            return Err(Error::config("Identity and serial headers must differ"));
        }

        if !self.database.url.is_empty()
            && !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            return Err(Error::config(
                "Database URL must start with 'postgres://' or 'postgresql://'",
            ));
        }

        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::config(format!("Invalid {} '{}': {}", field, value, e)))
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.into())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
        .unwrap_or(default)
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Browser origins are allowed when their host ends with this suffix
    #[validate(length(min = 1, message = "CORS origin suffix cannot be empty"))]
    pub cors_origin_suffix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
            cors_origin_suffix: "fadalax.tech".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create ServerConfig from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(listen) = std::env::var("IDP_LISTEN") {
            if let Err(e) = config.apply_listen(&listen) {
                eprintln!("Warning: ignoring IDP_LISTEN: {}", e);
            }
        }
        config.cors_origin_suffix = env_string("IDP_CORS_ORIGIN_SUFFIX", &config.cors_origin_suffix);
        config
    }

    /// Apply a `host:port` or `:port` listen specification
    pub fn apply_listen(&mut self, listen: &str) -> Result<()> {
        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("Listen address '{}' has no port", listen)))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::config(format!("Invalid listen port '{}': {}", port, e)))?;

        if !host.is_empty() {
            self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        }
        self.port = port;
        Ok(())
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Authz Server admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthzConfig {
    /// Base URL of the admin API
    #[validate(length(min = 1, message = "Admin URL cannot be empty"))]
    pub admin_url: String,

    /// Per-request timeout in milliseconds
    #[validate(range(min = 100, max = 60000, message = "Timeout must be between 100ms and 60s"))]
    pub request_timeout_ms: u64,

    /// Skip TLS verification of the admin endpoint (self-signed localhost listener)
    pub accept_invalid_certs: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_url: "https://localhost:9001".to_string(),
            request_timeout_ms: 2000,
            accept_invalid_certs: true,
        }
    }
}

impl AuthzConfig {
    /// Create AuthzConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_url: env_string("IDP_HYDRA_ADMIN_URL", &defaults.admin_url),
            request_timeout_ms: env_parse("IDP_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            accept_invalid_certs: env_bool(
                "IDP_HYDRA_ACCEPT_INVALID_CERTS",
                defaults.accept_invalid_certs,
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Secret Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Store address, e.g. `https://vault.fadalax.tech:8200`
    #[validate(length(min = 1, message = "Vault address cannot be empty"))]
    pub address: String,

    /// Service token used for revocation checks and provisioning
    pub token: SecretString,

    /// Enterprise namespace, sent as `X-Vault-Namespace`
    pub namespace: Option<String>,

    /// Mount of the shared root CA
    #[validate(length(min = 1, message = "Root PKI mount cannot be empty"))]
    pub root_mount: String,

    /// Per-request timeout in milliseconds
    #[validate(range(min = 100, max = 60000, message = "Timeout must be between 100ms and 60s"))]
    pub request_timeout_ms: u64,

    /// Skip TLS verification of the store endpoint
    pub accept_invalid_certs: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "https://vault.fadalax.tech:8200".to_string(),
            token: SecretString::default(),
            namespace: None,
            root_mount: "pki".to_string(),
            request_timeout_ms: 2000,
            accept_invalid_certs: false,
        }
    }
}

impl VaultConfig {
    /// Create VaultConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            address: env_string("VAULT_ADDR", &defaults.address),
            token: std::env::var("VAULT_TOKEN").map(SecretString::new).unwrap_or_default(),
            namespace: std::env::var("VAULT_NAMESPACE").ok().filter(|v| !v.is_empty()),
            root_mount: env_string("IDP_VAULT_ROOT_MOUNT", &defaults.root_mount),
            request_timeout_ms: env_parse("IDP_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            accept_invalid_certs: env_bool("IDP_VAULT_ACCEPT_INVALID_CERTS", false),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Certificate identity and per-principal PKI parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IdentityConfig {
    /// Trusted domain in `CN=<name>@<domain>`
    #[validate(length(min = 1, message = "Domain cannot be empty"))]
    pub domain: String,

    /// Proxy header carrying the verified certificate subject
    #[validate(length(min = 1, message = "Identity header cannot be empty"))]
    pub identity_header: String,

    /// Proxy header carrying the certificate serial
    #[validate(length(min = 1, message = "Serial header cannot be empty"))]
    pub serial_header: String,

    /// Principal whose certificates are issued from the root mount
    pub admin_principal: String,

    /// Subject organization of issued certificates
    #[validate(length(min = 1, message = "Organization cannot be empty"))]
    pub organization: String,

    /// Subject country of issued certificates
    #[validate(length(equal = 2, message = "Country must be a two-letter code"))]
    pub country: String,

    /// Lifetime of issued client certificates
    #[validate(length(min = 2, message = "Certificate TTL cannot be empty"))]
    pub certificate_ttl: String,

    /// Lifetime of per-principal intermediates and max lease of their mounts
    #[validate(length(min = 2, message = "Intermediate TTL cannot be empty"))]
    pub intermediate_ttl: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            domain: "fadalax.tech".to_string(),
            identity_header: "x-fadalax-auth".to_string(),
            serial_header: "x-fadalax-serial".to_string(),
            admin_principal: "admin".to_string(),
            organization: "imovies".to_string(),
            country: "CH".to_string(),
            certificate_ttl: "336h".to_string(),
            intermediate_ttl: "43800h".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Create IdentityConfig from environment variables
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            domain: env_string("IDP_DOMAIN", &d.domain),
            identity_header: env_string("IDP_IDENTITY_HEADER", &d.identity_header)
                .to_ascii_lowercase(),
            serial_header: env_string("IDP_SERIAL_HEADER", &d.serial_header).to_ascii_lowercase(),
            admin_principal: env_string("IDP_ADMIN_PRINCIPAL", &d.admin_principal),
            organization: env_string("IDP_CERT_ORGANIZATION", &d.organization),
            country: env_string("IDP_CERT_COUNTRY", &d.country),
            certificate_ttl: env_string("IDP_CERT_TTL", &d.certificate_ttl),
            intermediate_ttl: env_string("IDP_INTERMEDIATE_TTL", &d.intermediate_ttl),
        }
    }
}

/// Bearer token validation and Secret Store auth-role parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OidcConfig {
    /// OpenID Connect issuer of bearer tokens
    #[validate(length(min = 1, message = "Issuer cannot be empty"))]
    pub issuer: String,

    /// Expected audience of bearer tokens; also bound on per-principal JWT roles
    #[validate(length(min = 1, message = "Client id cannot be empty"))]
    pub client_id: String,

    /// Audience bound on per-principal OIDC roles
    #[validate(length(min = 1, message = "OIDC role audience cannot be empty"))]
    pub oidc_role_audience: String,

    /// Redirect URIs allowed on per-principal OIDC roles
    #[validate(length(min = 1, message = "At least one redirect URI is required"))]
    pub allowed_redirect_uris: Vec<String>,

    /// How long a fetched key set is reused before refetching
    #[validate(range(min = 1, max = 86400, message = "JWKS TTL must be between 1s and 24h"))]
    pub jwks_cache_ttl_seconds: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: "https://hydra.fadalax.tech:9000/".to_string(),
            client_id: "fadalax-frontend".to_string(),
            oidc_role_audience: "vault".to_string(),
            allowed_redirect_uris: vec![
                "https://vault.fadalax.tech:8200/ui/vault/auth/oidc/oidc/callback".to_string()
            ],
            jwks_cache_ttl_seconds: 300,
        }
    }
}

impl OidcConfig {
    /// Create OidcConfig from environment variables
    pub fn from_env() -> Self {
        let d = Self::default();
        let allowed_redirect_uris = std::env::var("IDP_OIDC_REDIRECT_URIS")
            .ok()
            .map(|v| {
                v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
            })
            .filter(|uris: &Vec<String>| !uris.is_empty())
            .unwrap_or(d.allowed_redirect_uris);

        Self {
            issuer: env_string("IDP_OIDC_ISSUER", &d.issuer),
            client_id: env_string("IDP_OIDC_CLIENT_ID", &d.client_id),
            oidc_role_audience: env_string("IDP_OIDC_ROLE_AUDIENCE", &d.oidc_role_audience),
            allowed_redirect_uris,
            jwks_cache_ttl_seconds: env_parse("IDP_JWKS_CACHE_TTL_SECONDS", d.jwks_cache_ttl_seconds),
        }
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}

/// User database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; empty disables password login
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: String::new(), max_connections: 5, connect_timeout_seconds: 5 }
    }
}

impl DatabaseConfig {
    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or_default(),
            max_connections: env_parse("IDP_DATABASE_MAX_CONNECTIONS", d.max_connections),
            connect_timeout_seconds: env_parse(
                "IDP_DATABASE_CONNECT_TIMEOUT_SECONDS",
                d.connect_timeout_seconds,
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Metrics server port (0 = disabled)
    pub metrics_port: u16,

    /// Service name attached to metrics and logs
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            service_name: "idp-bridge".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            metrics_port: env_parse("IDP_METRICS_PORT", d.metrics_port),
            service_name: env_string("IDP_SERVICE_NAME", &d.service_name),
            log_level: env_string("IDP_LOG_LEVEL", &d.log_level),
            json_logging: env_bool("IDP_JSON_LOGGING", d.json_logging),
        }
    }

    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}
