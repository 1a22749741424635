//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define exchange metrics (sessions, ledger calls, events, attestations)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `fairdex_sessions_total` (counter): finished sessions by role, outcome
//! - `fairdex_active_sessions` (gauge): sessions currently in flight
//! - `fairdex_ledger_calls_total` (counter): escrow calls by op, outcome
//! - `fairdex_ledger_events_total` (counter): observed events by kind
//! - `fairdex_attestations_total` (counter): verdicts by result
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording works without an installed exporter, so library use and tests
//!   need no setup

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter and its scrape listener.
///
/// Failure is logged, not fatal: the node runs fine without an exporter.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a finished session. `outcome` is the terminal state's stable name.
pub fn record_session_outcome(role: &'static str, outcome: &'static str) {
    counter!("fairdex_sessions_total", "role" => role, "outcome" => outcome).increment(1);
}

/// Track how many sessions are currently in flight.
pub fn set_active_sessions(count: usize) {
    gauge!("fairdex_active_sessions").set(count as f64);
}

/// Count one escrow call attempt and whether it succeeded.
pub fn record_ledger_call(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("fairdex_ledger_calls_total", "op" => op, "outcome" => outcome).increment(1);
}

/// Count an event observed from the ledger feed.
pub fn record_ledger_event(kind: &'static str) {
    counter!("fairdex_ledger_events_total", "kind" => kind).increment(1);
}

/// Count an attestation verdict.
pub fn record_attestation(accepted: bool) {
    let verdict = if accepted { "accepted" } else { "rejected" };
    counter!("fairdex_attestations_total", "verdict" => verdict).increment(1);
}
