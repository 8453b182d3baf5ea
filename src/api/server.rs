use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{config::ServerConfig, errors::Error};

use super::{routes::build_router, state::AppState};

pub async fn start_api_server(config: &ServerConfig, state: AppState) -> crate::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid listen address: {}", e)))?;

    let router: Router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind HTTP server: {}", e)))?;

    info!(address = %addr, "Starting HTTP server");
    run_http_server(listener, router).await?;

    info!("HTTP server shutdown completed");
    Ok(())
}

async fn run_http_server(listener: TcpListener, router: Router) -> crate::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "HTTP server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::transport(format!("HTTP server error: {}", e)))
}
