//! Reconnect delay policy.
//!
//! Ordinary failures back off exponentially from a base delay up to a cap.
//! Server-side throttling gets a flat floor instead, since retrying sooner
//! only extends the throttle. A small random jitter is added on top so a
//! fleet of bots does not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

/// How long to wait before reconnect attempt `n`.
///
/// ```text
///   throttled: max(base, throttle_floor)                 + jitter
///   otherwise: min(max_delay, base * 2^(attempt - 1))    + jitter
/// ```
///
/// Attempt numbers start at 1. Attempt 0 is treated as 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    pub throttle_floor: Duration,
    /// Jitter is drawn from `[0, max_jitter)`.
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            throttle_floor: Duration::from_secs(60),
            max_jitter: Duration::from_secs(3),
        }
    }
}

impl BackoffPolicy {
    /// The full delay for `attempt`, jitter included.
    pub fn delay(&self, attempt: u32, reason: &str) -> Duration {
        self.base_delay(attempt, reason) + self.jitter()
    }

    /// The delay without jitter.
    pub fn base_delay(&self, attempt: u32, reason: &str) -> Duration {
        if is_throttled(reason) {
            return self.throttle_floor.max(self.base);
        }
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }
}

/// Whether a disconnect reason says the server is rate limiting logins.
pub fn is_throttled(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    reason.contains("throttl") || reason.contains("rate limit") || reason.contains("rate-limit")
}
