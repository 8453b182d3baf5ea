//! # Log Subscriber Setup
//!
//! `RUST_LOG` takes precedence over the configured level. JSON output is meant
//! for log shippers; the default is the human-readable formatter.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Build the env filter from `RUST_LOG`, falling back to `config.log_level`.
pub fn env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::config(format!("Invalid log level '{}': {}", config.log_level, e))
        }),
    }
}

/// Install the global subscriber. A subscriber that is already installed
/// (integration tests, embedding binaries) is left in place.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json_logging {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if installed.is_err() {
        // Subscriber already set elsewhere; ignore.
    }
    Ok(())
}
