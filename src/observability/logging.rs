//! # Structured Logging
//!
//! Span macros and startup logging. Every HTTP request runs inside a
//! `request_span!` so log lines from the broker and the store clients can be
//! correlated by `request_id`.

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/login", challenge = %challenge);
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            principal = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            principal = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Log configuration at startup. Secrets are never included.
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        authz_admin_url = %config.authz.admin_url,
        vault_address = %config.vault.address,
        vault_namespace = ?config.vault.namespace,
        root_mount = %config.vault.root_mount,
        domain = %config.identity.domain,
        issuer = %config.oidc.issuer,
        password_login = config.database.is_configured(),
        metrics_address = ?config.observability.metrics_bind_address(),
        "Identity bridge configuration"
    );
}
