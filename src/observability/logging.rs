//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from `LoggingConfig`
//! - Narrate policy events (`TracingListener`)
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::PolicyError;
use crate::resilience::events::{PolicyListener, RetryContext};

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("resilient_client={}", config.level.to_ascii_lowercase()).into()
    });

    let layer = match (config.format, config.timestamp) {
        (LogFormat::Json, true) => fmt::layer().json().boxed(),
        (LogFormat::Json, false) => fmt::layer().json().without_time().boxed(),
        (LogFormat::Pretty, true) => fmt::layer().boxed(),
        (LogFormat::Pretty, false) => fmt::layer().without_time().boxed(),
    };

    tracing_subscriber::registry().with(layer).with(filter).try_init()
}

/// Logs every policy event with the policy's name.
#[derive(Debug, Clone)]
pub struct TracingListener {
    policy: String,
}

impl TracingListener {
    pub fn new(policy: impl Into<String>) -> Self {
        Self { policy: policy.into() }
    }
}

impl PolicyListener for TracingListener {
    fn on_retry(&self, ctx: &RetryContext<'_>) {
        tracing::info!(
            policy = %self.policy,
            attempt = ctx.attempt + 1,
            max_attempts = ctx.max_attempts,
            delay_secs = format_args!("{:.2}", ctx.delay.as_secs_f64()),
            error = %ctx.error,
            "Operation failed, retrying"
        );
    }

    fn on_break(&self, error: &PolicyError, break_duration: Duration) {
        tracing::warn!(
            policy = %self.policy,
            reason = %error,
            break_secs = break_duration.as_secs_f64(),
            "Circuit OPENED"
        );
    }

    fn on_half_open(&self) {
        tracing::info!(policy = %self.policy, "Circuit HALF-OPEN, allowing a trial request");
    }

    fn on_reset(&self) {
        tracing::info!(policy = %self.policy, "Circuit CLOSED, service recovered");
    }

    fn on_state_change(&self, from: CircuitState, to: CircuitState) {
        tracing::debug!(policy = %self.policy, %from, %to, "Circuit state changed");
    }
}
