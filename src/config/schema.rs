//! Configuration schema definitions.
//!
//! Keys are camelCase and durations are milliseconds, e.g.
//!
//! ```toml
//! [retry]
//! maxAttempts = 6
//! initialDelay = 1000
//! maxDelay = 30000
//!
//! [circuitBreaker]
//! failureThreshold = 3
//! successThreshold = 2
//! breakDuration = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResilienceConfig {
    /// Retry policy settings.
    pub retry: RetryConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Optional per-attempt time limit.
    pub timeout: TimeoutConfig,

    /// Simulated remote dependency.
    pub external_api: ExternalApiConfig,

    /// Logging output.
    pub logging: LoggingConfig,

    /// Pacing of the demo driver.
    pub demo: DemoConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,

    /// Base backoff before jitter, in milliseconds.
    #[serde(rename = "initialDelay")]
    pub initial_delay_ms: u64,

    /// Backoff ceiling, in milliseconds.
    #[serde(rename = "maxDelay")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(rename = "failureThreshold")]
    pub failure_threshold: u32,

    /// Consecutive Half-Open successes that close it again.
    #[serde(rename = "successThreshold")]
    pub success_threshold: u32,

    /// Time the circuit stays open before a trial, in milliseconds.
    #[serde(rename = "breakDuration")]
    pub break_duration_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn break_duration(&self) -> Duration {
        Duration::from_millis(self.break_duration_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            break_duration_ms: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-attempt limit in milliseconds. Unset means no limit.
    #[serde(rename = "attemptTimeout", skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,
}

impl TimeoutConfig {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

/// Simulated endpoint behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalApiConfig {
    /// Minimum simulated latency in milliseconds.
    pub min_latency: u64,

    /// Maximum simulated latency in milliseconds.
    pub max_latency: u64,

    /// Percent chance of a transient failure when success is expected.
    pub transient_failure_rate: u8,

    /// Percent failure rate once the guaranteed failures are used up.
    pub flaky_failure_rate: u8,

    /// Guaranteed failures before the endpoint turns flaky.
    pub consecutive_failure_threshold: u32,
}

impl ExternalApiConfig {
    pub fn min_latency(&self) -> Duration {
        Duration::from_millis(self.min_latency)
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency)
    }
}

impl Default for ExternalApiConfig {
    fn default() -> Self {
        Self {
            min_latency: 50,
            max_latency: 200,
            transient_failure_rate: 5,
            flaky_failure_rate: 70,
            consecutive_failure_threshold: 3,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,

    pub format: LogFormat,

    /// Include timestamps in log lines.
    pub timestamp: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            timestamp: true,
        }
    }
}

/// Demo driver pacing, all in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    #[serde(rename = "delayBetweenGroups")]
    pub delay_between_groups_ms: u64,

    #[serde(rename = "delayServiceDown")]
    pub delay_service_down_ms: u64,

    #[serde(rename = "delayRecovery")]
    pub delay_recovery_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            delay_between_groups_ms: 300,
            delay_service_down_ms: 1000,
            delay_recovery_ms: 500,
        }
    }
}
