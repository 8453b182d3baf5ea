//! # Configuration Management
//!
//! Immutable [`AppConfig`] built once at startup from the environment (and an
//! optional `.env` file), then overridden by command-line flags.

pub mod settings;

pub use settings::{
    AppConfig, AuthzConfig, DatabaseConfig, IdentityConfig, ObservabilityConfig, OidcConfig,
    ServerConfig, VaultConfig,
};
