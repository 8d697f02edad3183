//! Metrics collection and exposition.
//!
//! # Metrics
//! - `license_circuit_transitions_total` (counter): transitions by breaker, target state
//! - `license_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `license_circuit_rejections_total` (counter): fail-fast rejections by breaker
//! - `license_retry_operations_total` (counter): retry sequences by outcome
//! - `license_retry_attempts_total` (counter): individual attempts by outcome
//! - `license_vault_operations_total` (counter): vault calls by op, outcome
//! - `license_store_operations_total` (counter): license store save/load by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels never carry payloads or key material

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_circuit_transition(breaker: &str, state: CircuitState) {
    counter!(
        "license_circuit_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
    gauge!("license_circuit_state", "breaker" => breaker.to_string()).set(state as u8 as f64);
}

pub fn record_circuit_rejection(breaker: &str) {
    counter!("license_circuit_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_retry_operation(success: bool) {
    counter!("license_retry_operations_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_retry_attempt(success: bool) {
    counter!("license_retry_attempts_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_vault_operation(op: &'static str, success: bool) {
    counter!(
        "license_vault_operations_total",
        "op" => op,
        "outcome" => outcome(success)
    )
    .increment(1);
}

pub fn record_store_operation(op: &'static str, success: bool) {
    counter!(
        "license_store_operations_total",
        "op" => op,
        "outcome" => outcome(success)
    )
    .increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
