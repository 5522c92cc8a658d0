//! Resilient client library: retry with backoff and a circuit breaker
//! composed around calls to an unreliable dependency.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod simulation;

pub use config::schema::ResilienceConfig;
pub use lifecycle::Shutdown;
pub use resilience::{
    execute_resiliently, execute_resiliently_cancellable, wrap, CircuitBreaker, CircuitState,
    ExecutionFailure, FailureClass, Policy, PolicyError, ResilientPolicy, RetryPolicy,
};
