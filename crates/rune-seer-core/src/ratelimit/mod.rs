//! Per-client request rate limiting.
//!
//! Every client identity gets its own token bucket. A request is allowed when
//! the identity's bucket holds at least one token, which it then consumes;
//! otherwise it is denied. Exhaustion is an ordinary [`Decision::Deny`], never
//! an error.
//!
//! ```text
//!   identity ──► RateLimiter ──► Mutex<HashMap<identity, Visitor>>
//!                    │                         │
//!                    ▼                         ▼
//!              Allow / Deny        TokenBucket + last_seen
//! ```
//!
//! The visitor map grows with every new identity. [`RateLimiter::sweep`]
//! drops visitors idle for longer than the configured TTL; the server calls it
//! on a fixed interval. A swept identity that comes back starts over with a
//! full bucket.
//!
//! # Example
//!
//! ```
//! use rune_seer_core::config::RateLimitConfig;
//! use rune_seer_core::ratelimit::{Decision, RateLimiter};
//!
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//! for _ in 0..5 {
//!     assert_eq!(limiter.check("203.0.113.7"), Decision::Allow);
//! }
//! assert_eq!(limiter.check("203.0.113.7"), Decision::Deny);
//! ```

mod bucket;
pub mod identity;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, trace};

use crate::config::RateLimitConfig;
use bucket::TokenBucket;

pub use identity::{HeaderLookup, resolve_client_identity};

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Decision {
    /// The request may proceed; one token was consumed.
    Allow,
    /// The client is over its limit; nothing was consumed.
    Deny,
}

impl Decision {
    /// Whether the request may proceed.
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `"allow"` or `"deny"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Visitor {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Token-bucket limiter keyed by client identity.
///
/// All state lives behind one mutex; share the limiter through an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    visitors: Mutex<HashMap<String, Visitor>>,
}

impl RateLimiter {
    /// Create a limiter with no tracked visitors.
    ///
    /// `config` is assumed valid; see [`RateLimitConfig::validate`].
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    /// The policy this limiter enforces.
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check one request from `identity` against its bucket.
    pub fn check(&self, identity: &str) -> Decision {
        self.check_at(identity, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    ///
    /// A denied request still refreshes `last_seen`, so idle expiry counts
    /// from the last contact rather than the last allowed request.
    pub fn check_at(&self, identity: &str, now: Instant) -> Decision {
        let RateLimitConfig {
            refill_per_second,
            burst,
            ..
        } = self.config;

        let mut visitors = self.lock();
        let visitor = visitors.entry(identity.to_string()).or_insert_with(|| {
            debug!(identity, "tracking new visitor");
            Visitor {
                bucket: TokenBucket::full(burst, now),
                last_seen: now,
            }
        });
        visitor.last_seen = visitor.last_seen.max(now);

        let decision = if visitor.bucket.try_take(now, refill_per_second, burst) {
            Decision::Allow
        } else {
            Decision::Deny
        };
        drop(visitors);

        trace!(identity, %decision, "rate limit check");
        decision
    }

    /// Drop visitors idle for longer than the TTL. Returns how many went.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.config.visitor_ttl();
        let mut visitors = self.lock();
        let before = visitors.len();
        visitors.retain(|_, v| now.saturating_duration_since(v.last_seen) <= ttl);
        let removed = before - visitors.len();
        let remaining = visitors.len();
        drop(visitors);

        debug!(removed, remaining, "swept idle visitors");
        removed
    }

    /// Number of tracked visitors.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no visitor is tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `identity` currently has a bucket.
    pub fn is_tracked(&self, identity: &str) -> bool {
        self.lock().contains_key(identity)
    }

    /// A panic while holding the lock cannot leave a bucket half-written
    /// (every write is a plain field store), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Visitor>> {
        self.visitors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        RateLimiter::default()
    }

    #[test]
    fn burst_then_deny_then_refill() {
        let limiter = limiter();
        let t0 = Instant::now();

        for i in 0..5 {
            assert_eq!(limiter.check_at("a", t0), Decision::Allow, "request {i}");
        }
        assert_eq!(limiter.check_at("a", t0), Decision::Deny);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(limiter.check_at("a", t1), Decision::Allow);
        assert_eq!(limiter.check_at("a", t1), Decision::Deny);
    }

    #[test]
    fn identities_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at("a", now).is_allowed());
        }
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn deny_does_not_consume_refill() {
        let limiter = limiter();
        let t0 = Instant::now();
        for _ in 0..5 {
            let _ = limiter.check_at("a", t0);
        }
        // denied half-way through the refill window
        assert_eq!(
            limiter.check_at("a", t0 + Duration::from_millis(500)),
            Decision::Deny
        );
        assert_eq!(
            limiter.check_at("a", t0 + Duration::from_millis(1000)),
            Decision::Allow
        );
    }

    #[test]
    fn sustained_rate_is_one_per_second() {
        let limiter = limiter();
        let t0 = Instant::now();
        let allowed = (0..100u64)
            .filter(|step| {
                limiter
                    .check_at("a", t0 + Duration::from_millis(step * 100))
                    .is_allowed()
            })
            .count();
        // 5 burst + floor(9.9s * 1/s)
        assert_eq!(allowed, 14);
    }

    #[test]
    fn sweep_removes_only_idle_visitors() {
        let limiter = limiter();
        let t0 = Instant::now();
        let _ = limiter.check_at("idle", t0);
        let _ = limiter.check_at("active", t0 + Duration::from_secs(9 * 60));

        let removed = limiter.sweep_at(t0 + Duration::from_secs(11 * 60));
        assert_eq!(removed, 1);
        assert!(!limiter.is_tracked("idle"));
        assert!(limiter.is_tracked("active"));
    }

    #[test]
    fn denied_request_refreshes_last_seen() {
        let limiter = RateLimiter::new(RateLimitConfig {
            refill_per_second: 0.001,
            burst: 1,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).is_allowed());
        assert_eq!(
            limiter.check_at("a", t0 + Duration::from_secs(5 * 60)),
            Decision::Deny
        );

        // 11 minutes after the last allow, 6 after the last contact
        assert_eq!(limiter.sweep_at(t0 + Duration::from_secs(11 * 60)), 0);
        assert!(limiter.is_tracked("a"));
    }

    #[test]
    fn swept_visitor_returns_with_full_burst() {
        let limiter = limiter();
        let t0 = Instant::now();
        for _ in 0..6 {
            let _ = limiter.check_at("a", t0);
        }
        let later = t0 + Duration::from_secs(20 * 60);
        assert_eq!(limiter.sweep_at(later), 1);
        assert!(limiter.is_empty());
        for _ in 0..5 {
            assert!(limiter.check_at("a", later).is_allowed());
        }
        assert!(!limiter.check_at("a", later).is_allowed());
    }

    #[test]
    fn custom_policy() {
        let limiter = RateLimiter::new(RateLimitConfig {
            refill_per_second: 10.0,
            burst: 1,
            ..RateLimitConfig::default()
        });
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).is_allowed());
        assert!(!limiter.check_at("a", t0).is_allowed());
        assert!(
            limiter
                .check_at("a", t0 + Duration::from_millis(100))
                .is_allowed()
        );
    }

    #[test]
    fn concurrent_checks_never_over_admit() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            refill_per_second: 0.001,
            burst: 50,
            ..RateLimitConfig::default()
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.check("shared").is_allowed())
                        .count()
                })
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }

    #[test]
    fn sweep_on_empty_map_is_noop() {
        assert_eq!(limiter().sweep(), 0);
    }

    #[test]
    fn decision_display() {
        assert_eq!(Decision::Allow.to_string(), "allow");
        assert_eq!(Decision::Deny.as_str(), "deny");
    }
}
