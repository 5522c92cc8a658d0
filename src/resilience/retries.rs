//! Retry logic.
//!
//! # Responsibilities
//! - Re-run the inner chain up to `max_attempts` times
//! - Wait a full-jitter exponential backoff between attempts
//! - Consult a retry predicate before each retry
//! - Abort promptly on cancellation, including mid-backoff
//!
//! # Design Decisions
//! - Attempts are strictly sequential within one call
//! - Every attempt re-enters the inner chain, so a breaker further in is
//!   consulted each time
//! - `Cancelled` is never retried, regardless of the predicate
//! - The backoff wait holds no lock

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::resilience::backoff::ExponentialBackoff;
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::{PolicyError, PolicyResult};
use crate::resilience::events::{Listeners, PolicyListener, RetryContext};
use crate::resilience::policy::Policy;

type RetryPredicate = Arc<dyn Fn(&PolicyError) -> bool + Send + Sync>;

/// Retry policy with exponential backoff and full jitter.
pub struct RetryPolicy {
    name: String,
    max_attempts: u32,
    backoff: ExponentialBackoff,
    should_retry: RetryPredicate,
    clock: Arc<dyn Clock>,
    listeners: Listeners,
}

impl RetryPolicy {
    pub fn new(name: impl Into<String>, config: &RetryConfig) -> Self {
        Self {
            name: name.into(),
            max_attempts: config.max_attempts.max(1),
            backoff: ExponentialBackoff::new(config.initial_delay(), config.max_delay()),
            should_retry: Arc::new(|_| true),
            clock: Arc::new(TokioClock),
            listeners: Listeners::new(),
        }
    }

    /// Only retry errors for which `predicate` returns true.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&PolicyError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the jitter source with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.backoff = ExponentialBackoff::with_seed(self.backoff.initial(), self.backoff.max(), seed);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PolicyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn is_retryable(&self, error: &PolicyError) -> bool {
        !error.is_cancelled() && (self.should_retry)(error)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl Policy for RetryPolicy {
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
        async move {
            let mut attempt: u32 = 1;

            loop {
                if cancel.is_cancelled() {
                    return Err(PolicyError::Cancelled);
                }

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(PolicyError::Cancelled),
                    result = operation() => result,
                };

                let error = match outcome {
                    Ok(value) => return Ok(value),
                    Err(error) => error,
                };

                if !self.is_retryable(&error) {
                    tracing::debug!(
                        policy = %self.name,
                        attempt,
                        error = %error,
                        "Error not retryable, propagating"
                    );
                    return Err(error);
                }

                if attempt >= self.max_attempts {
                    tracing::debug!(
                        policy = %self.name,
                        attempts = attempt,
                        error = %error,
                        "Retries exhausted"
                    );
                    return Err(PolicyError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }

                let delay = self.backoff.delay(attempt);
                self.listeners.retry(&RetryContext {
                    attempt,
                    max_attempts: self.max_attempts,
                    base_delay: delay.ceiling,
                    delay: delay.jittered,
                    error: &error,
                });

                if wait_with_cancel(self.clock.as_ref(), cancel, delay.jittered)
                    .await
                    .is_err()
                {
                    return Err(PolicyError::Cancelled);
                }

                attempt += 1;
            }
        }
    }
}

/// Sleep on `clock`, returning early with `Err` if `cancel` fires.
async fn wait_with_cancel(
    clock: &dyn Clock,
    cancel: &CancellationToken,
    duration: Duration,
) -> Result<(), ()> {
    if duration.is_zero() {
        return if cancel.is_cancelled() { Err(()) } else { Ok(()) };
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(()),
        _ = clock.sleep(duration) => Ok(()),
    }
}
