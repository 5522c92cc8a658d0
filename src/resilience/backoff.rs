//! Exponential backoff with full jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Pre-jitter delay for a 1-indexed attempt: `min(initial * 2^(n-1), max)`.
pub fn backoff_ceiling(attempt: u32, initial: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    if initial.is_zero() {
        return Duration::ZERO;
    }

    // Exact in u128 nanoseconds; overflowing u128 is certainly above `max`.
    let cap = max.as_nanos();
    let product = 1u128
        .checked_shl(attempt - 1)
        .and_then(|factor| initial.as_nanos().checked_mul(factor));
    match product {
        Some(nanos) if nanos < cap => from_nanos_u128(nanos),
        _ => max,
    }
}

fn from_nanos_u128(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

/// Sample uniformly from `[0, ceiling]`.
pub fn full_jitter<R: Rng + ?Sized>(ceiling: Duration, rng: &mut R) -> Duration {
    let nanos = u64::try_from(ceiling.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..=nanos))
}

/// A delay before jitter, and the value actually waited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    pub ceiling: Duration,
    pub jittered: Duration,
}

/// Backoff calculator with its own random source.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic jitter sequence.
    pub fn with_seed(initial: Duration, max: Duration, seed: u64) -> Self {
        Self {
            initial,
            max,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after the given 1-indexed attempt failed.
    pub fn delay(&self, attempt: u32) -> Delay {
        let ceiling = backoff_ceiling(attempt, self.initial, self.max);
        let mut rng = self.rng.lock().expect("backoff rng mutex poisoned");
        Delay {
            ceiling,
            jittered: full_jitter(ceiling, &mut *rng),
        }
    }
}
