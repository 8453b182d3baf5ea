//! Health check endpoint for liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::state::AppState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Whether the Secret Store answered its health probe
    pub secret_store: bool,
}

/// `GET /healthz`: 200 while the Secret Store is reachable and unsealed,
/// 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse { status: "ok".to_string(), secret_store: true }),
        ),
        Err(e) => {
            warn!(error = %e, "Secret Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded".to_string(), secret_store: false }),
            )
        }
    }
}
