//! Continuous-time token bucket.

use std::time::Instant;

/// Token state for one client.
///
/// Tokens are accounted lazily: nothing happens between calls, and each call
/// credits `elapsed * refill_per_second` since the last successful take,
/// capped at the burst size.
#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// A bucket holding `burst` tokens as of `now`.
    pub(crate) fn full(burst: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(burst),
            last: now,
        }
    }

    /// Tokens that would be available at `now`, without committing them.
    pub(crate) fn available_at(&self, now: Instant, refill_per_second: f64, burst: u32) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        elapsed
            .mul_add(refill_per_second, self.tokens)
            .min(f64::from(burst))
    }

    /// Take one token if available. State is only written on success.
    pub(crate) fn try_take(&mut self, now: Instant, refill_per_second: f64, burst: u32) -> bool {
        let available = self.available_at(now, refill_per_second, burst);
        if available < 1.0 {
            return false;
        }
        self.tokens = available - 1.0;
        self.last = self.last.max(now);
        true
    }
}
