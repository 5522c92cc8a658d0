//! Notification hooks for policy state changes.
//!
//! Listeners receive shared references only and return nothing, so they
//! cannot influence a policy decision. A policy with no listeners behaves
//! identically to one with many.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::PolicyError;

/// Per-retry data handed to [`PolicyListener::on_retry`]. Not retained.
#[derive(Debug)]
pub struct RetryContext<'a> {
    /// The attempt that just failed (1-indexed).
    pub attempt: u32,
    /// Configured attempt limit.
    pub max_attempts: u32,
    /// Computed delay before jitter.
    pub base_delay: Duration,
    /// Delay that will actually be waited.
    pub delay: Duration,
    /// The failure that triggered the retry.
    pub error: &'a PolicyError,
}

/// Observer of retry and circuit-breaker events.
pub trait PolicyListener: Send + Sync {
    fn on_retry(&self, _ctx: &RetryContext<'_>) {}

    fn on_break(&self, _error: &PolicyError, _break_duration: Duration) {}

    fn on_half_open(&self) {}

    fn on_reset(&self) {}

    /// Fired after every state change, alongside the specific hook.
    fn on_state_change(&self, _from: CircuitState, _to: CircuitState) {}
}

/// Ordered set of listeners attached to one policy.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Vec<Arc<dyn PolicyListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Arc<dyn PolicyListener>) {
        self.inner.push(listener);
    }

    pub(crate) fn retry(&self, ctx: &RetryContext<'_>) {
        for listener in &self.inner {
            listener.on_retry(ctx);
        }
    }

    pub(crate) fn state_change(&self, change: &Transition) {
        for listener in &self.inner {
            match change {
                Transition::Break { error, break_duration, .. } => {
                    listener.on_break(error, *break_duration)
                }
                Transition::HalfOpen => listener.on_half_open(),
                Transition::Reset { .. } => listener.on_reset(),
            }
            let (from, to) = change.states();
            listener.on_state_change(from, to);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.inner.len()).finish()
    }
}

/// A circuit state change, captured under the lock and published after it
/// is released.
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Break {
        from: CircuitState,
        error: PolicyError,
        break_duration: Duration,
    },
    HalfOpen,
    Reset {
        from: CircuitState,
    },
}

impl Transition {
    fn states(&self) -> (CircuitState, CircuitState) {
        match self {
            Transition::Break { from, .. } => (*from, CircuitState::Open),
            Transition::HalfOpen => (CircuitState::Open, CircuitState::HalfOpen),
            Transition::Reset { from } => (*from, CircuitState::Closed),
        }
    }
}
