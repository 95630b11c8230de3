//! Prometheus metrics for fleet-service.
//!
//! HTTP request metrics come from the shared middleware; this module adds
//! notification dispatch and audit pipeline counters.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record one notification delivery attempt.
pub fn record_dispatch(kind: &'static str, outcome: &'static str) {
    counter!("notification_dispatch_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_audit(outcome: &'static str) {
    counter!("audit_records_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_dropped() {
    counter!("audit_queue_dropped_total").increment(1);
}
