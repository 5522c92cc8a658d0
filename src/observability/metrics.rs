//! Metrics collection.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): terminal outcomes by `outcome`
//! - `resilience_call_duration_seconds` (histogram): end-to-end latency including retries
//! - `resilience_retries_total` (counter): retries scheduled, by `policy`
//! - `resilience_circuit_transitions_total` (counter): by `policy`, `to`
//! - `resilience_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! # Design Decisions
//! - `metrics` facade only; the embedding application installs a recorder
//! - Without a recorder every call is a no-op

use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::events::{PolicyListener, RetryContext};

/// Record a terminal call outcome.
pub fn record_call(outcome: &'static str, start: Instant) {
    metrics::counter!("resilience_calls_total", "outcome" => outcome).increment(1);
    metrics::histogram!("resilience_call_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(policy: &str) {
    metrics::counter!("resilience_retries_total", "policy" => policy.to_string()).increment(1);
}

pub fn record_circuit_state(policy: &str, state: CircuitState) {
    metrics::counter!(
        "resilience_circuit_transitions_total",
        "policy" => policy.to_string(),
        "to" => state.as_str()
    )
    .increment(1);
    metrics::gauge!("resilience_circuit_state", "policy" => policy.to_string())
        .set(state as u8 as f64);
}

/// Feeds policy events into the metrics above.
#[derive(Debug, Clone)]
pub struct MetricsListener {
    policy: String,
}

impl MetricsListener {
    pub fn new(policy: impl Into<String>) -> Self {
        Self { policy: policy.into() }
    }
}

impl PolicyListener for MetricsListener {
    fn on_retry(&self, _ctx: &RetryContext<'_>) {
        record_retry(&self.policy);
    }

    fn on_state_change(&self, _from: CircuitState, to: CircuitState) {
        record_circuit_state(&self.policy, to);
    }
}
