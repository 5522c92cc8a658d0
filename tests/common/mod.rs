//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use resilient_client::config::{CircuitBreakerConfig, ExternalApiConfig, ResilienceConfig, RetryConfig};
use resilient_client::resilience::{PolicyError, PolicyListener, RetryContext};
use resilient_client::CircuitState;

/// Failure returned by scripted operations.
#[derive(Debug, Error)]
#[error("dependency unavailable")]
pub struct Unavailable;

/// Counts invocations of an operation.
#[derive(Debug, Default)]
pub struct CallCounter(AtomicU32);

impl CallCounter {
    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A listener that records every event as a short string.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Circuit events only, without retries and state changes.
    pub fn circuit_events(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e.as_str(), "break" | "half_open" | "reset"))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PolicyListener for RecordingListener {
    fn on_retry(&self, ctx: &RetryContext<'_>) {
        self.push(format!("retry {} {}", ctx.attempt, ctx.base_delay.as_millis()));
    }

    fn on_break(&self, _error: &PolicyError, _break_duration: Duration) {
        self.push("break".into());
    }

    fn on_half_open(&self) {
        self.push("half_open".into());
    }

    fn on_reset(&self) {
        self.push("reset".into());
    }

    fn on_state_change(&self, from: CircuitState, to: CircuitState) {
        self.push(format!("state {from}->{to}"));
    }
}

pub fn retry_config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 1000,
        max_delay_ms: 30_000,
    }
}

pub fn breaker_config(failure_threshold: u32, success_threshold: u32, break_ms: u64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        success_threshold,
        break_duration_ms: break_ms,
    }
}

/// Development defaults with the given retry and breaker settings.
pub fn resilience_config(max_attempts: u32, breaker: CircuitBreakerConfig) -> ResilienceConfig {
    ResilienceConfig {
        retry: retry_config(max_attempts),
        circuit_breaker: breaker,
        ..ResilienceConfig::default()
    }
}

/// Endpoint that never fails randomly and is down for good once asked to fail.
pub fn deterministic_api() -> ExternalApiConfig {
    ExternalApiConfig {
        min_latency: 10,
        max_latency: 20,
        transient_failure_rate: 0,
        flaky_failure_rate: 100,
        consecutive_failure_threshold: 3,
    }
}
