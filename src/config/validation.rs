//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, ceilings above bases, rates <= 100)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ResilienceConfig;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("retry.maxAttempts must be at least 1")]
    NoAttempts,

    #[error("retry.maxDelay ({max_ms}ms) must be >= retry.initialDelay ({initial_ms}ms)")]
    DelayCeilingBelowBase { initial_ms: u64, max_ms: u64 },

    #[error("circuitBreaker.{0} must be at least 1")]
    ZeroThreshold(&'static str),

    #[error("timeout.attemptTimeout must be greater than 0 when set")]
    ZeroTimeout,

    #[error("externalApi.maxLatency ({max}ms) must be >= externalApi.minLatency ({min}ms)")]
    LatencyRange { min: u64, max: u64 },

    #[error("externalApi.{field} is a percentage, got {value}")]
    RateOutOfRange { field: &'static str, value: u8 },

    #[error("logging.level '{0}' is not one of error, warn, info, debug, trace")]
    UnknownLogLevel(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::NoAttempts);
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        errors.push(ValidationError::DelayCeilingBelowBase {
            initial_ms: retry.initial_delay_ms,
            max_ms: retry.max_delay_ms,
        });
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("failureThreshold"));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("successThreshold"));
    }

    if config.timeout.attempt_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }

    let api = &config.external_api;
    if api.max_latency < api.min_latency {
        errors.push(ValidationError::LatencyRange {
            min: api.min_latency,
            max: api.max_latency,
        });
    }
    for (field, value) in [
        ("transientFailureRate", api.transient_failure_rate),
        ("flakyFailureRate", api.flaky_failure_rate),
    ] {
        if value > 100 {
            errors.push(ValidationError::RateOutOfRange { field, value });
        }
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&ResilienceConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ResilienceConfig::default();
        config.retry.max_attempts = 0;
        config.retry.initial_delay_ms = 500;
        config.retry.max_delay_ms = 100;
        config.circuit_breaker.success_threshold = 0;
        config.external_api.flaky_failure_rate = 150;
        config.logging.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoAttempts,
                ValidationError::DelayCeilingBelowBase { initial_ms: 500, max_ms: 100 },
                ValidationError::ZeroThreshold("successThreshold"),
                ValidationError::RateOutOfRange { field: "flakyFailureRate", value: 150 },
                ValidationError::UnknownLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn test_zero_break_duration_is_allowed() {
        let mut config = ResilienceConfig::default();
        config.circuit_breaker.break_duration_ms = 0;
        config.retry.initial_delay_ms = 0;
        config.retry.max_delay_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
