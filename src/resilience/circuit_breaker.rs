//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one trial call at a time tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first call after break_duration has elapsed (lazy, no timer task)
//! Half-Open → Closed: consecutive_successes >= success_threshold
//! Half-Open → Open: any trial failure (break timer restarts)
//! ```
//!
//! # Design Decisions
//! - One instance per dependency, shared by reference or `Arc`
//! - State and counters live behind a single mutex; the lock is never held
//!   across an await or while listeners run
//! - Every transition bumps a generation counter; outcomes of calls admitted
//!   under an older generation are ignored
//! - Only one trial is in flight per Half-Open window; a trial that is
//!   cancelled or dropped frees the slot without counting

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::CircuitBreakerConfig;
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::error::{PolicyError, PolicyResult};
use crate::resilience::events::{Listeners, PolicyListener, Transition};
use crate::resilience::policy::Policy;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an open circuit may admit a trial call.
pub fn break_elapsed(now: Instant, opened_at: Instant, break_duration: Duration) -> bool {
    now.saturating_duration_since(opened_at) >= break_duration
}

/// Time left before an open circuit becomes eligible for a trial.
pub fn break_remaining(now: Instant, opened_at: Instant, break_duration: Duration) -> Duration {
    break_duration.saturating_sub(now.saturating_duration_since(opened_at))
}

/// Point-in-time copy of the breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub opened_at: Option<Instant>,
    pub trial_in_flight: bool,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    generation: u64,
}

impl Inner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            trial_in_flight: false,
            generation: 0,
        }
    }
}

/// Circuit breaker state machine.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    break_duration: Duration,
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    listeners: Listeners,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            break_duration: config.break_duration(),
            inner: Mutex::new(Inner::closed()),
            clock: Arc::new(TokioClock),
            listeners: Listeners::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PolicyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    /// Current state. Does not evaluate the break timer.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.lock();
        CircuitStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            opened_at: inner.opened_at,
            trial_in_flight: inner.trial_in_flight,
        }
    }

    /// Return to Closed with zero counters, whatever the prior state.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            let generation = inner.generation + 1;
            *inner = Inner::closed();
            inner.generation = generation;
            (from != CircuitState::Closed).then_some(Transition::Reset { from })
        };

        if let Some(transition) = transition {
            self.publish(&transition);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn publish(&self, transition: &Transition) {
        self.listeners.state_change(transition);
    }

    /// Decide whether a call may proceed.
    fn acquire(&self) -> Result<Permit<'_>, PolicyError> {
        let now = self.clock.now();
        let mut transition = None;

        let admitted = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Ok((inner.generation, false)),
                CircuitState::Open => {
                    let opened_at = inner.opened_at.unwrap_or(now);
                    if break_elapsed(now, opened_at, self.break_duration) {
                        inner.state = CircuitState::HalfOpen;
                        inner.consecutive_successes = 0;
                        inner.trial_in_flight = true;
                        inner.generation += 1;
                        transition = Some(Transition::HalfOpen);
                        Ok((inner.generation, true))
                    } else {
                        Err(PolicyError::CircuitOpen {
                            remaining: break_remaining(now, opened_at, self.break_duration),
                        })
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.trial_in_flight {
                        Err(PolicyError::CircuitOpen { remaining: Duration::ZERO })
                    } else {
                        inner.trial_in_flight = true;
                        Ok((inner.generation, true))
                    }
                }
            }
        };

        if let Some(transition) = transition {
            self.publish(&transition);
        }

        admitted.map(|(generation, trial)| Permit {
            breaker: self,
            generation,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, generation: u64) {
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    inner.trial_in_flight = false;
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.success_threshold {
                        let next = inner.generation + 1;
                        *inner = Inner::closed();
                        inner.generation = next;
                        Some(Transition::Reset { from: CircuitState::HalfOpen })
                    } else {
                        None
                    }
                }
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.publish(&transition);
        }
    }

    fn on_failure(&self, generation: u64, error: &PolicyError) {
        let now = self.clock.now();
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            let from = inner.state;
            let trip = match from {
                CircuitState::Closed => {
                    inner.consecutive_failures += 1;
                    inner.consecutive_failures >= self.failure_threshold
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_failures += 1;
                    true
                }
                CircuitState::Open => false,
            };

            trip.then(|| {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.consecutive_successes = 0;
                inner.trial_in_flight = false;
                inner.generation += 1;
                Transition::Break {
                    from,
                    error: error.clone(),
                    break_duration: self.break_duration,
                }
            })
        };

        if let Some(transition) = transition {
            self.publish(&transition);
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("break_duration", &self.break_duration)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Admission ticket for one call.
///
/// Dropping an unsettled trial permit frees the Half-Open slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.generation);
    }

    fn failure(mut self, error: &PolicyError) {
        self.settled = true;
        self.breaker.on_failure(self.generation, error);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial(self.generation);
        }
    }
}

impl Policy for CircuitBreaker {
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
            if cancel.is_cancelled() {
                return Err(PolicyError::Cancelled);
            }

            let permit = match self.acquire() {
                Ok(permit) => permit,
                Err(rejection) => {
                    tracing::debug!(breaker = %self.name, error = %rejection, "Call rejected");
                    return Err(rejection);
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PolicyError::Cancelled),
                result = operation() => result,
            };

            match &outcome {
                Ok(_) => permit.success(),
                Err(error) if error.counts_as_failure() => permit.failure(error),
                Err(_) => drop(permit),
            }

            outcome
        }
    }
}
