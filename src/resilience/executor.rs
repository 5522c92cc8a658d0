//! Entry point for callers.
//!
//! Runs a user operation through a composed policy and classifies the
//! terminal error. No retry or state-machine logic lives here.

use std::fmt;
use std::future::Future;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::resilience::error::{BoxError, FailureKind, PolicyError};
use crate::resilience::policy::Policy;

/// Caller-facing class of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Refused by an open circuit without running the operation.
    CircuitOpen,
    Timeout,
    Cancelled,
    /// The operation failed and retries (if any) did not help.
    Failed,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::CircuitOpen => "circuit_open",
            FailureClass::Timeout => "timeout",
            FailureClass::Cancelled => "cancelled",
            FailureClass::Failed => "failed",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify by root cause, so exhausted retries over a rejecting circuit are
/// reported as `CircuitOpen`.
pub fn classify(error: &PolicyError) -> FailureClass {
    match error.root_cause().kind() {
        FailureKind::CircuitOpen => FailureClass::CircuitOpen,
        FailureKind::Timeout => FailureClass::Timeout,
        FailureKind::Cancelled => FailureClass::Cancelled,
        FailureKind::Operation | FailureKind::RetriesExhausted => FailureClass::Failed,
    }
}

/// A classified terminal failure. `error` is the policy chain's own error, unchanged.
#[derive(Debug, Error)]
#[error("{class}: {error}")]
pub struct ExecutionFailure {
    pub class: FailureClass,
    #[source]
    pub error: PolicyError,
}

impl ExecutionFailure {
    pub fn new(error: PolicyError) -> Self {
        Self {
            class: classify(&error),
            error,
        }
    }
}

/// Run `operation` through `policy`.
pub async fn execute_resiliently<P, T, E, F, Fut>(
    operation: F,
    policy: &P,
) -> Result<T, ExecutionFailure>
where
    P: Policy,
    T: Send,
    E: Into<BoxError>,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
{
    execute_resiliently_cancellable(operation, policy, &CancellationToken::new()).await
}

/// Run `operation` through `policy`, aborting with `Cancelled` when `cancel` fires.
pub async fn execute_resiliently_cancellable<P, T, E, F, Fut>(
    operation: F,
    policy: &P,
    cancel: &CancellationToken,
) -> Result<T, ExecutionFailure>
where
    P: Policy,
    T: Send,
    E: Into<BoxError>,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
{
    let start = Instant::now();
    let operation = &operation;
    let result = policy
        .execute(cancel, move || {
            let attempt = operation();
            async move { attempt.await.map_err(PolicyError::operation) }
        })
        .await;

    match result {
        Ok(value) => {
            metrics::record_call("success", start);
            Ok(value)
        }
        Err(error) => {
            let failure = ExecutionFailure::new(error);
            report(&failure);
            metrics::record_call(failure.class.as_str(), start);
            Err(failure)
        }
    }
}

fn report(failure: &ExecutionFailure) {
    match failure.class {
        FailureClass::CircuitOpen => {
            tracing::error!(error = %failure.error, "Request rejected immediately by open circuit")
        }
        FailureClass::Timeout => tracing::error!(error = %failure.error, "Operation timed out"),
        FailureClass::Cancelled => tracing::warn!(error = %failure.error, "Operation was cancelled"),
        FailureClass::Failed => {
            tracing::error!(error = %failure.error, "Operation ultimately failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification_follows_root_cause() {
        let open = PolicyError::CircuitOpen { remaining: Duration::ZERO };
        let exhausted_open = PolicyError::RetriesExhausted {
            attempts: 6,
            last: Box::new(open.clone()),
        };
        let exhausted_op = PolicyError::RetriesExhausted {
            attempts: 6,
            last: Box::new(PolicyError::operation("nope")),
        };

        assert_eq!(classify(&open), FailureClass::CircuitOpen);
        assert_eq!(classify(&exhausted_open), FailureClass::CircuitOpen);
        assert_eq!(classify(&exhausted_op), FailureClass::Failed);
        assert_eq!(classify(&PolicyError::Cancelled), FailureClass::Cancelled);
        assert_eq!(classify(&PolicyError::Timeout(Duration::from_secs(1))), FailureClass::Timeout);
    }
}
