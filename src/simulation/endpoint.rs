//! Simulated endpoint.
//!
//! # Behaviour
//! ```text
//! idempotent, success expected:   fail with transient_failure_rate %, else succeed
//! idempotent, failure expected:   fail for the first consecutive_failure_threshold calls,
//!                                 then fail with flaky_failure_rate %
//! non-idempotent:                 succeed or fail as expected, never randomly
//! ```
//!
//! A rate of `r` % fails exactly `r` in 100 rolls (draw from `0..100`), so
//! 0 never fails and 100 always fails.
//!
//! The instance's failure count advances on every transient failure and on
//! every failure-mode call, including one that recovers. Each call first
//! sleeps a uniformly random latency in `[min_latency, max_latency]`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::config::ExternalApiConfig;

/// Failures the endpoint can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("Idempotent API call failed transiently (simulated failure {0})")]
    Transient(u32),

    #[error("Idempotent API call failed (simulated failure {0})")]
    Unavailable(u32),

    #[error("Non-idempotent API call failed (e.g. order created but response lost)")]
    NonIdempotent,
}

/// A fake remote service with injectable failures.
#[derive(Debug)]
pub struct SimulatedEndpoint {
    config: ExternalApiConfig,
    failure_count: AtomicU32,
    rng: Mutex<StdRng>,
}

impl SimulatedEndpoint {
    pub fn new(config: ExternalApiConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: ExternalApiConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ExternalApiConfig, rng: StdRng) -> Self {
        Self {
            config,
            failure_count: AtomicU32::new(0),
            rng: Mutex::new(rng),
        }
    }

    /// Failures produced since construction or the last reset.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn reset_failure_count(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
    }

    /// A safely repeatable call, e.g. `GET /products/{id}`.
    pub async fn perform_idempotent_action(
        &self,
        success_expected: bool,
    ) -> Result<String, EndpointError> {
        tracing::debug!(success_expected, "Attempting idempotent API call");
        tokio::time::sleep(self.latency()).await;

        if success_expected {
            if self.roll(self.config.transient_failure_rate) {
                return Err(EndpointError::Transient(self.record_failure()));
            }
            return Ok("Success: Idempotent API call completed.".to_string());
        }

        let failures = self.record_failure();
        if failures <= self.config.consecutive_failure_threshold
            || self.roll(self.config.flaky_failure_rate)
        {
            return Err(EndpointError::Unavailable(failures));
        }

        tracing::debug!("Idempotent API call unexpectedly succeeded (partial recovery)");
        Ok("Success: Idempotent API call (partial recovery).".to_string())
    }

    /// A call that must not be retried blindly, e.g. `POST /orders`.
    pub async fn perform_non_idempotent_action(
        &self,
        success_expected: bool,
    ) -> Result<String, EndpointError> {
        tracing::debug!(success_expected, "Attempting non-idempotent API call");
        tokio::time::sleep(self.latency()).await;

        if success_expected {
            Ok("Success: Non-idempotent API call completed.".to_string())
        } else {
            self.record_failure();
            Err(EndpointError::NonIdempotent)
        }
    }

    fn record_failure(&self) -> u32 {
        self.failure_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn latency(&self) -> Duration {
        let min = self.config.min_latency();
        let max = self.config.max_latency().max(min);
        self.rng().gen_range(min..=max)
    }

    /// True with `percent` % probability.
    fn roll(&self, percent: u8) -> bool {
        self.rng().gen_range(0..100u8) < percent
    }

    fn rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().expect("endpoint rng mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> ExternalApiConfig {
        ExternalApiConfig {
            min_latency: 1,
            max_latency: 5,
            transient_failure_rate: 0,
            flaky_failure_rate: 100,
            consecutive_failure_threshold: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_expected_without_transient_failures() {
        let endpoint = SimulatedEndpoint::with_seed(quiet_config(), 1);
        for _ in 0..10 {
            assert!(endpoint.perform_idempotent_action(true).await.is_ok());
        }
        assert_eq!(endpoint.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guaranteed_failures_then_flaky() {
        let mut config = quiet_config();
        config.flaky_failure_rate = 0;
        let endpoint = SimulatedEndpoint::with_seed(config, 2);

        for n in 1..=3 {
            assert_eq!(
                endpoint.perform_idempotent_action(false).await,
                Err(EndpointError::Unavailable(n))
            );
        }
        // flaky rate 0: past the guaranteed failures every call recovers
        assert!(endpoint.perform_idempotent_action(false).await.is_ok());
        assert_eq!(endpoint.failure_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_when_fully_flaky() {
        let endpoint = SimulatedEndpoint::with_seed(quiet_config(), 3);
        for _ in 0..6 {
            assert!(endpoint.perform_idempotent_action(false).await.is_err());
        }
        assert_eq!(endpoint.failure_count(), 6);

        endpoint.reset_failure_count();
        assert_eq!(endpoint.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_idempotent_follows_expectation() {
        let endpoint = SimulatedEndpoint::with_seed(quiet_config(), 4);
        assert!(endpoint.perform_non_idempotent_action(true).await.is_ok());
        assert_eq!(
            endpoint.perform_non_idempotent_action(false).await,
            Err(EndpointError::NonIdempotent)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_within_bounds() {
        let endpoint = SimulatedEndpoint::with_seed(quiet_config(), 5);
        for _ in 0..20 {
            let latency = endpoint.latency();
            assert!(latency >= Duration::from_millis(1) && latency <= Duration::from_millis(5));
        }
    }
}
