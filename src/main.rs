use std::sync::Arc;

use clap::Parser;
use idp_bridge::{
    api::{start_api_server, AppState},
    auth::{CredentialVerifier, OidcTokenValidator, PgCredentialStore, StaticCredentials},
    authz::HydraAdminClient,
    cli::Cli,
    observability::{init_observability, log_config_info},
    secrets::VaultSecretStore,
    AppConfig, Result, APP_NAME, VERSION,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any configuration is read from the environment
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if the error is NOT "file not found"
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    cli.apply(&mut config)?;
    config.validate()?;

    init_observability(&config.observability)?;

    info!(app_name = APP_NAME, version = VERSION, "Starting identity bridge");
    log_config_info(&config);

    let authz = Arc::new(HydraAdminClient::new(&config.authz)?);
    let store = Arc::new(VaultSecretStore::new(&config.vault)?);

    let credentials: Arc<dyn CredentialVerifier> = if config.database.is_configured() {
        Arc::new(PgCredentialStore::connect_lazy(&config.database)?)
    } else {
        warn!("DATABASE_URL not set; password login is disabled");
        Arc::new(StaticCredentials::new())
    };

    let tokens = Arc::new(OidcTokenValidator::new(&config.oidc, config.authz.request_timeout())?);

    let server_config = config.server.clone();
    let state = AppState::new(config, authz, store, credentials, tokens)?;

    if let Err(e) = start_api_server(&server_config, state).await {
        error!(error = %e, "HTTP server terminated with error");
        return Err(e);
    }

    info!("Identity bridge stopped");
    Ok(())
}
