//! # Metrics Collection
//!
//! Prometheus counters for login, consent, provisioning and certificate
//! lifecycle outcomes. Recording is a no-op until [`init_metrics`] installs
//! the exporter, so core code records unconditionally.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

const LOGIN_TOTAL: &str = "idp_login_total";
const CONSENT_TOTAL: &str = "idp_consent_total";
const PROVISIONING_TOTAL: &str = "idp_provisioning_total";
const CERTIFICATES_ISSUED_TOTAL: &str = "idp_certificates_issued_total";
const CERTIFICATES_REVOKED_TOTAL: &str = "idp_certificates_revoked_total";

/// Metrics recorder that tracks bridge outcomes
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a login decision (`method`: certificate/password, `outcome`:
    /// accepted/rejected/error)
    pub fn record_login(&self, method: &str, outcome: &str) {
        let labels = [("method", method.to_string()), ("outcome", outcome.to_string())];
        counter!(LOGIN_TOTAL, &labels).increment(1);
    }

    pub fn record_consent(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!(CONSENT_TOTAL, &labels).increment(1);
    }

    pub fn record_provisioning(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!(PROVISIONING_TOTAL, &labels).increment(1);
    }

    pub fn record_certificate_issued(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!(CERTIFICATES_ISSUED_TOTAL, &labels).increment(1);
    }

    /// Record one serial's revocation result
    pub fn record_certificate_revoked(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!(CERTIFICATES_REVOKED_TOTAL, &labels).increment(1);
    }

    /// Describe every counter and register the known label sets at zero so
    /// dashboards see them before the first event.
    pub fn register_bridge_metrics(&self) {
        describe_counter!(LOGIN_TOTAL, Unit::Count, "Login challenges resolved, by method and outcome");
        describe_counter!(CONSENT_TOTAL, Unit::Count, "Consent challenges resolved, by outcome");
        describe_counter!(
            PROVISIONING_TOTAL,
            Unit::Count,
            "Per-principal PKI environments provisioned"
        );
        describe_counter!(
            CERTIFICATES_ISSUED_TOTAL,
            Unit::Count,
            "Client certificates issued as PKCS#12 bundles"
        );
        describe_counter!(
            CERTIFICATES_REVOKED_TOTAL,
            Unit::Count,
            "Client certificates revoked by serial"
        );

        for method in ["certificate", "password"] {
            for outcome in ["accepted", "rejected", "error"] {
                counter!(LOGIN_TOTAL, "method" => method, "outcome" => outcome).absolute(0);
            }
        }
        for outcome in ["granted", "prompted", "error"] {
            counter!(CONSENT_TOTAL, "outcome" => outcome).absolute(0);
        }
        for outcome in ["provisioned", "failed"] {
            counter!(PROVISIONING_TOTAL, "outcome" => outcome).absolute(0);
        }
        for outcome in ["success", "failed"] {
            counter!(CERTIFICATES_ISSUED_TOTAL, "outcome" => outcome).absolute(0);
            counter!(CERTIFICATES_REVOKED_TOTAL, "outcome" => outcome).absolute(0);
        }
    }
}

/// Install the Prometheus exporter. Port 0 disables it.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().register_bridge_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

pub fn record_login(method: &str, outcome: &str) {
    MetricsRecorder.record_login(method, outcome);
}

pub fn record_consent(outcome: &str) {
    MetricsRecorder.record_consent(outcome);
}

pub fn record_provisioning(outcome: &str) {
    MetricsRecorder.record_provisioning(outcome);
}

pub fn record_certificate_issued(outcome: &str) {
    MetricsRecorder.record_certificate_issued(outcome);
}

pub fn record_certificate_revoked(outcome: &str) {
    MetricsRecorder.record_certificate_revoked(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_no_op() {
        let recorder = MetricsRecorder::new();
        recorder.register_bridge_metrics();
        recorder.record_login("certificate", "accepted");
        record_consent("granted");
        record_provisioning("provisioned");
        record_certificate_issued("success");
        record_certificate_revoked("failed");
    }

    #[test]
    fn disabled_port_skips_exporter() {
        let config = ObservabilityConfig { metrics_port: 0, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
