use crate::config::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Exponential delay with bounded jitter between submission rounds.
///
/// Round `n >= 1` waits a duration in `[2^n * base, 2^n * base + jitter)`.
/// Round `0` is the first submission and never waits.
#[derive(Debug)]
pub struct Backoff {
    base_ms: u64,
    jitter_ms: u64,
    rng: Option<Mutex<StdRng>>,
}

impl Backoff {
    pub fn new(base_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base_ms,
            jitter_ms,
            rng: None,
        }
    }

    /// Reproducible jitter for tests and simulations.
    pub fn seeded(base_ms: u64, jitter_ms: u64, seed: u64) -> Self {
        Self {
            base_ms,
            jitter_ms,
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn from_policy(policy: &RetryPolicy, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(policy.base_backoff_ms, policy.jitter_ms, seed),
            None => Self::new(policy.base_backoff_ms, policy.jitter_ms),
        }
    }

    /// Inclusive lower and exclusive upper bound of the delay before `round`.
    pub fn bounds(&self, round: u32) -> (Duration, Duration) {
        if round == 0 {
            return (Duration::ZERO, Duration::ZERO);
        }
        let low = 2u64.saturating_pow(round).saturating_mul(self.base_ms);
        let high = low.saturating_add(self.jitter_ms);
        (Duration::from_millis(low), Duration::from_millis(high))
    }

    pub fn delay_for_round(&self, round: u32) -> Duration {
        let (low, _) = self.bounds(round);
        if round == 0 {
            return low;
        }
        low + Duration::from_millis(self.jitter())
    }

    fn jitter(&self) -> u64 {
        if self.jitter_ms == 0 {
            return 0;
        }
        match &self.rng {
            Some(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(0..self.jitter_ms),
            None => rand::thread_rng().gen_range(0..self.jitter_ms),
        }
    }
}
