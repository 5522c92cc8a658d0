//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound each call of the inner chain with a deadline
//! - Cancel the timed-out attempt by dropping its future
//!
//! # Design Decisions
//! - The deadline is a `Clock::sleep`, so a `ManualClock` drives it in tests
//! - Timeout errors are distinct from other errors (`PolicyError::Timeout`)
//! - A breaker placed outside a timeout counts the timeout as a failure

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::{PolicyError, PolicyResult};
use crate::resilience::policy::Policy;

/// Per-call time limit.
#[derive(Clone)]
pub struct TimeoutPolicy {
    duration: Duration,
    clock: Arc<dyn Clock>,
}

impl TimeoutPolicy {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Debug for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutPolicy")
            .field("duration", &self.duration)
            .finish()
    }
}

impl Policy for TimeoutPolicy {
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
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PolicyError::Cancelled),
                result = operation() => result,
                // Lazy, so a manual clock only advances when the operation is still pending.
                _ = async { self.clock.sleep(self.duration).await } => {
                    tracing::debug!(timeout = ?self.duration, "Attempt timed out");
                    Err(PolicyError::Timeout(self.duration))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let policy = TimeoutPolicy::new(Duration::from_millis(100));
        let result: PolicyResult<()> = policy
            .execute(&CancellationToken::new(), || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(PolicyError::Timeout(d)) if d == Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_passes_through() {
        let policy = TimeoutPolicy::new(Duration::from_secs(1));
        let result = policy
            .execute(&CancellationToken::new(), || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, PolicyError>(5)
            })
            .await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_manual_clock_drives_deadline() {
        let clock = Arc::new(ManualClock::new());
        let policy = TimeoutPolicy::new(Duration::from_secs(30)).with_clock(clock.clone());

        let result: PolicyResult<()> = policy
            .execute(&CancellationToken::new(), || std::future::pending())
            .await;

        assert!(matches!(result, Err(PolicyError::Timeout(d)) if d == Duration::from_secs(30)));
        assert_eq!(clock.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_ready_operation_beats_manual_deadline() {
        let clock = Arc::new(ManualClock::new());
        let policy = TimeoutPolicy::new(Duration::from_secs(30)).with_clock(clock.clone());

        let result = policy
            .execute(&CancellationToken::new(), || async { Ok::<_, PolicyError>(1) })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
