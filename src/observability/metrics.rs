//! Metrics collection.
//!
//! # Metrics
//! - `kaze_provider_calls_total` (counter): provider calls by provider, call, outcome
//! - `kaze_router_weight` (gauge): probability of routing to kryptonDB
//! - `kaze_discovery_latency_ms` (histogram): winning ping latency by provider
//! - `kaze_transactions_submitted_total` (counter): submissions by outcome
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use std::time::Duration;

use crate::provider::ProviderKind;

pub fn record_provider_call(provider: ProviderKind, call: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "kaze_provider_calls_total",
        "provider" => provider.as_str(),
        "call" => call,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_router_weight(weight: f64) {
    metrics::gauge!("kaze_router_weight").set(weight);
}

pub fn record_discovery_latency(provider: ProviderKind, latency: Duration) {
    metrics::histogram!("kaze_discovery_latency_ms", "provider" => provider.as_str())
        .record(latency.as_secs_f64() * 1000.0);
}

pub fn record_submission(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("kaze_transactions_submitted_total", "outcome" => outcome).increment(1);
}
