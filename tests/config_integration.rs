//! Integration tests for configuration management
//!
//! These tests validate that configuration is read from the environment,
//! that command-line flags take precedence, and that the HTTP server binds
//! to the configured listen address.

mod common;

use anyhow::Result;
use clap::Parser;
use idp_bridge::{api::start_api_server, cli::Cli, AppConfig};
use std::env;
use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;
use tracing::Instrument;
use tracing_test::traced_test;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const VARS: [&str; 4] = ["IDP_LISTEN", "IDP_HYDRA_ADMIN_URL", "VAULT_ADDR", "IDP_DOMAIN"];

fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let saved: Vec<(&str, Option<String>)> = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

    for key in VARS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    f();

    for (key, value) in saved {
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }
}

fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

#[test]
fn test_config_environment_integration() {
    with_env(
        &[
            ("IDP_LISTEN", "127.0.0.1:18088"),
            ("IDP_HYDRA_ADMIN_URL", "https://hydra.internal:4445"),
            ("VAULT_ADDR", "https://vault.internal:8200"),
            ("IDP_DOMAIN", "example.org"),
        ],
        || {
            let config = AppConfig::from_env();
            assert_eq!(config.server.bind_address(), "127.0.0.1:18088");
            assert_eq!(config.authz.admin_url, "https://hydra.internal:4445");
            assert_eq!(config.vault.address, "https://vault.internal:8200");
            assert_eq!(config.identity.domain, "example.org");
            assert!(config.validate().is_ok());
        },
    );
}

#[test]
fn test_config_defaults_integration() {
    with_env(&[], || {
        let config = AppConfig::from_env();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8088");
        assert_eq!(config.identity.domain, "fadalax.tech");
        assert!(config.validate().is_ok());
    });
}

#[test]
fn test_flags_override_environment() {
    with_env(&[("IDP_LISTEN", ":7000"), ("VAULT_ADDR", "https://from-env:8200")], || {
        let cli = Cli::parse_from(["idp-bridge", "--listen", ":7443", "--vault-url", "https://from-flag:8200"]);
        let mut config = AppConfig::from_env();
        cli.apply(&mut config).unwrap();

        assert_eq!(config.server.port, 7443);
        assert_eq!(config.vault.address, "https://from-flag:8200");
    });
}

#[test]
fn test_invalid_admin_url_fails_validation() {
    with_env(&[("IDP_HYDRA_ADMIN_URL", "not a url")], || {
        assert!(AppConfig::from_env().validate().is_err());
    });
}

/// Validates that the HTTP server actually binds to the configured address
#[traced_test]
#[tokio::test]
async fn test_http_server_binds_to_configured_port() -> Result<()> {
    let port = find_available_port();
    let app = common::test_app();

    let mut server_config = app.state.config.server.clone();
    server_config.apply_listen(&format!("127.0.0.1:{}", port))?;

    let server = tokio::spawn(
        async move { start_api_server(&server_config, app.state).await }
            .instrument(tracing::Span::current()),
    );

    let url = format!("http://127.0.0.1:{}/healthz", port);
    let mut status = None;
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(&url).await {
            status = Some(response.status());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.abort();

    assert_eq!(status, Some(reqwest::StatusCode::OK));
    assert!(logs_contain("Starting HTTP server"));
    Ok(())
}
