//! Error taxonomy shared by every policy.
//!
//! Policies only ever see [`PolicyError`]. Operation failures are wrapped as
//! [`PolicyError::Operation`] at the edge (see `executor.rs`), everything else
//! is manufactured by a policy.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type accepted from user operations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type used along the policy chain.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// The underlying failure of a wrapped operation.
///
/// Shared behind an `Arc` so that listeners and retry bookkeeping can hold
/// on to it without requiring the user's error type to be `Clone`.
#[derive(Clone)]
pub struct OperationError(Arc<dyn StdError + Send + Sync + 'static>);

impl OperationError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(Arc::from(error.into()))
    }

    /// Access the original error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }

    /// Try to view the original error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for OperationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Errors produced along a policy chain.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// The wrapped operation itself failed.
    #[error("operation failed: {0}")]
    Operation(OperationError),

    /// The last failure after `max_attempts` was reached.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PolicyError>,
    },

    /// Refused without invoking the operation.
    #[error("circuit open, rejecting call (retry in {remaining:?})")]
    CircuitOpen { remaining: Duration },

    /// Caller-initiated abort during a wait, attempt or trial.
    #[error("operation cancelled")]
    Cancelled,

    /// The attempt did not complete within its time limit.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Closed classification of a [`PolicyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Operation,
    RetriesExhausted,
    CircuitOpen,
    Cancelled,
    Timeout,
}

impl FailureKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Operation => "operation",
            FailureKind::RetriesExhausted => "retries_exhausted",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PolicyError {
    /// Wrap an operation's own error.
    pub fn operation(error: impl Into<BoxError>) -> Self {
        PolicyError::Operation(OperationError::new(error))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PolicyError::Operation(_) => FailureKind::Operation,
            PolicyError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            PolicyError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            PolicyError::Cancelled => FailureKind::Cancelled,
            PolicyError::Timeout(_) => FailureKind::Timeout,
        }
    }

    /// The innermost error, looking through any `RetriesExhausted` wrappers.
    pub fn root_cause(&self) -> &PolicyError {
        let mut current = self;
        while let PolicyError::RetriesExhausted { last, .. } = current {
            current = last;
        }
        current
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PolicyError::Cancelled)
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Whether a circuit breaker should record this outcome as a failure.
    ///
    /// Cancellation is the caller's decision, not evidence about the
    /// dependency's health.
    pub fn counts_as_failure(&self) -> bool {
        !self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_root_cause_unwraps_exhaustion() {
        let err = PolicyError::RetriesExhausted {
            attempts: 3,
            last: Box::new(PolicyError::CircuitOpen {
                remaining: Duration::from_secs(1),
            }),
        };
        assert_eq!(err.kind(), FailureKind::RetriesExhausted);
        assert_eq!(err.root_cause().kind(), FailureKind::CircuitOpen);
    }

    #[test]
    fn test_operation_error_downcast() {
        let err = PolicyError::operation(Boom);
        match &err {
            PolicyError::Operation(op) => assert!(op.downcast_ref::<Boom>().is_some()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.to_string(), "operation failed: boom");
    }

    #[test]
    fn test_cancellation_is_not_a_failure() {
        assert!(!PolicyError::Cancelled.counts_as_failure());
        assert!(PolicyError::Timeout(Duration::from_millis(5)).counts_as_failure());
    }
}
