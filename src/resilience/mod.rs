//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → executor.rs (wrap operation errors, classify terminal failure)
//!     → retries.rs (re-run inner chain with backoff.rs delays)
//!     → circuit_breaker.rs (fast-fail when open, record outcomes)
//!     → timeouts.rs (optional per-attempt deadline)
//!     → operation
//! ```
//!
//! # Design Decisions
//! - Retry outermost, breaker innermost: every attempt re-checks circuit health
//! - Time comes from clock.rs so transitions are testable without sleeping
//! - Hooks in events.rs are notifications only
//! - All resilience logic is composable through `policy::wrap`

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod events;
pub mod executor;
pub mod policy;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitState, CircuitStats};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{BoxError, FailureKind, OperationError, PolicyError, PolicyResult};
pub use events::{PolicyListener, RetryContext};
pub use executor::{
    execute_resiliently, execute_resiliently_cancellable, ExecutionFailure, FailureClass,
};
pub use policy::{wrap, Policy, Wrap};
pub use retries::RetryPolicy;
pub use timeouts::TimeoutPolicy;

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ResilienceConfig;
use crate::observability::{MetricsListener, TracingListener};

type Chain = Wrap<RetryPolicy, Wrap<Arc<CircuitBreaker>, Option<TimeoutPolicy>>>;

/// Retry (outer) around a circuit breaker (inner), built from configuration.
#[derive(Debug)]
pub struct ResilientPolicy {
    name: String,
    breaker: Arc<CircuitBreaker>,
    chain: Chain,
}

impl ResilientPolicy {
    /// Build with logging and metrics listeners attached.
    pub fn from_config(name: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self::builder(name, config).build()
    }

    pub fn builder(name: impl Into<String>, config: &ResilienceConfig) -> ResilientPolicyBuilder {
        ResilientPolicyBuilder {
            name: name.into(),
            config: config.clone(),
            clock: Arc::new(TokioClock),
            seed: None,
            listeners: Vec::new(),
            observe: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared breaker, for inspection or a manual reset.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryPolicy {
        self.chain.outer()
    }
}

impl Policy for ResilientPolicy {
    fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> impl Future<Output = PolicyResult<T>> + Send
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = PolicyResult<T>> + Send,
    {
        self.chain.execute(cancel, operation)
    }
}

/// Builder for [`ResilientPolicy`].
pub struct ResilientPolicyBuilder {
    name: String,
    config: ResilienceConfig,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    listeners: Vec<Arc<dyn PolicyListener>>,
    observe: bool,
}

impl ResilientPolicyBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the retry jitter.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn PolicyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Skip the built-in tracing and metrics listeners.
    pub fn without_observability(mut self) -> Self {
        self.observe = false;
        self
    }

    pub fn build(self) -> ResilientPolicy {
        let mut listeners = self.listeners;
        if self.observe {
            listeners.insert(0, Arc::new(TracingListener::new(&self.name)));
            listeners.insert(1, Arc::new(MetricsListener::new(&self.name)));
        }

        let mut retry =
            RetryPolicy::new(self.name.clone(), &self.config.retry).with_clock(self.clock.clone());
        if let Some(seed) = self.seed {
            retry = retry.with_seed(seed);
        }
        let mut breaker = CircuitBreaker::new(self.name.clone(), &self.config.circuit_breaker)
            .with_clock(self.clock.clone());
        for listener in listeners {
            retry = retry.with_listener(listener.clone());
            breaker = breaker.with_listener(listener);
        }

        let breaker = Arc::new(breaker);
        let timeout = self
            .config
            .timeout
            .attempt_timeout()
            .map(|limit| TimeoutPolicy::new(limit).with_clock(self.clock.clone()));

        tracing::debug!(
            policy = %self.name,
            max_attempts = self.config.retry.max_attempts,
            failure_threshold = self.config.circuit_breaker.failure_threshold,
            break_duration_ms = self.config.circuit_breaker.break_duration_ms,
            attempt_timeout = ?timeout.as_ref().map(TimeoutPolicy::duration),
            "Resilient policy created"
        );

        ResilientPolicy {
            name: self.name,
            breaker: breaker.clone(),
            chain: wrap(retry, wrap(breaker, timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("unavailable")]
    struct Unavailable;

    #[tokio::test]
    async fn test_composed_policy_reopens_circuit_mid_retry() {
        let mut config = ResilienceConfig::default();
        // Keep the circuit open across all simulated backoff sleeps.
        config.circuit_breaker.break_duration_ms = 600_000;
        let clock = Arc::new(ManualClock::new());
        let policy = ResilientPolicy::builder("composed", &config)
            .clock(clock.clone())
            .seed(9)
            .without_observability()
            .build();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = execute_resiliently(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Unavailable)
            },
            &policy,
        )
        .await;

        // failure_threshold = 3, so attempts 4..=6 are rejected by the breaker.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let failure = result.unwrap_err();
        assert_eq!(failure.class, FailureClass::CircuitOpen);
        assert!(matches!(
            failure.error,
            PolicyError::RetriesExhausted { attempts: 6, .. }
        ));
        assert_eq!(policy.breaker().state(), CircuitState::Open);
        assert_eq!(clock.sleeps().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_against_breaker() {
        let mut config = ResilienceConfig::default();
        config.retry.max_attempts = 1;
        config.circuit_breaker.failure_threshold = 1;
        config.timeout.attempt_timeout_ms = Some(50);
        let policy = ResilientPolicy::builder("timeouts", &config)
            .without_observability()
            .build();

        let result = execute_resiliently(
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Unavailable>(())
            },
            &policy,
        )
        .await;

        assert_eq!(result.unwrap_err().class, FailureClass::Timeout);
        assert_eq!(policy.breaker().state(), CircuitState::Open);
    }
}
