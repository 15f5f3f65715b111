//! Round budget and inter-round backoff.

use std::time::Duration;

/// Rounds a single sync call may execute before giving up.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// How many rounds to run, and how long to wait between failing ones.
///
/// The round cap is the livelock guard: if the server keeps producing work,
/// the sync stops after `max_rounds` and reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPolicy {
    /// Maximum number of execute rounds per sync call.
    pub max_rounds: u32,
    /// Delay before recalculating after a round that recorded failures.
    pub backoff: Option<Backoff>,
}

impl RoundPolicy {
    /// A policy with the given round cap and no backoff.
    pub fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            backoff: None,
        }
    }

    /// Add a backoff between failing rounds.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Delay to apply after `round` (1-based) if it recorded failures.
    pub fn delay_after(&self, round: u32) -> Option<Duration> {
        self.backoff
            .map(|b| b.delay(round.saturating_sub(1)))
            .filter(|d| !d.is_zero())
    }
}

impl Default for RoundPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROUNDS)
    }
}

/// Exponential backoff with an optional random jitter.
///
/// Formula: min(max, base * 2^attempt), and with jitter a uniform draw
/// from 0 up to that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    /// Create a backoff.
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self { base, max, jitter }
    }

    /// Delay for the given zero-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_random(attempt, random_u64())
    }

    /// Delay for the given attempt using a caller-provided random value.
    pub fn delay_with_random(&self, attempt: u32, random: u64) -> Duration {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.min(16);
        let exp = base_ms.saturating_mul(1u64 << shift).min(max_ms);
        let delay_ms = if self.jitter {
            random % exp.saturating_add(1)
        } else {
            exp
        };
        Duration::from_millis(delay_ms)
    }
}

/// A random u64, or zero if the OS source is unavailable.
fn random_u64() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => 0,
    }
}
