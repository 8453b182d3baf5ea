//! # Observability Infrastructure
//!
//! Structured logging via `tracing`, request spans, and Prometheus counters
//! for the bridge's decisions.

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::log_config_info;
pub use metrics::{init_metrics, MetricsRecorder};
pub use tracing::init_tracing;

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging, then the metrics exporter if a port is configured.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_tracing(config)?;
    init_metrics(config)?;

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        metrics_enabled = config.metrics_bind_address().is_some(),
        "Observability initialized successfully"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_observability_without_metrics() {
        let config = ObservabilityConfig { metrics_port: 0, ..Default::default() };
        assert!(init_observability(&config).is_ok());
    }
}
