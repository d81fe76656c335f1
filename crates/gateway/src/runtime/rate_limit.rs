//! Keyed token-bucket rate limiting.
//!
//! Each bucket group maps a string key (user id or client IP) to
//! `(tokens, last_refill)`. Counters are process-local; multi-replica
//! deployments shard users to a replica or back this with an external
//! counter service.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use astrea_domain::config::RatesConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One bucket group
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Whole seconds until a token is available; ≥ 1 when denied.
    pub retry_after: u64,
}

impl RateDecision {
    const ALLOWED: RateDecision = RateDecision {
        allowed: true,
        retry_after: 0,
    };
}

/// A group of token buckets sharing one capacity/refill configuration.
///
/// Capacity equals the per-minute rate; refill is `rate / 60` tokens per
/// second. Buckets are created full on first sight and are only evicted
/// by [`TokenBuckets::prune_idle`].
pub struct TokenBuckets {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBuckets {
    pub fn per_minute(rate: f64) -> Self {
        Self {
            capacity: rate,
            refill_per_sec: rate / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> RateDecision {
        self.allow_at(key, Instant::now())
    }

    /// Clock-injected variant so tests do not sleep.
    pub fn allow_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now
            .saturating_duration_since(bucket.last_refill)
            .as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return RateDecision::ALLOWED;
        }

        let wait = (1.0 - bucket.tokens) / self.refill_per_sec;
        RateDecision {
            allowed: false,
            retry_after: (wait.ceil() as u64).max(1),
        }
    }

    /// Drop buckets that have refilled to capacity (idle since at least
    /// one full drain interval).
    pub fn prune_idle(&self) {
        self.prune_idle_at(Instant::now());
    }

    fn prune_idle_at(&self, now: Instant) {
        let mut buckets = self.buckets.lock();
        buckets.retain(|_, bucket| {
            let elapsed = now
                .saturating_duration_since(bucket.last_refill)
                .as_secs_f64();
            bucket.tokens + elapsed * self.refill_per_sec < self.capacity
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The five configured bucket groups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RateLimiter {
    /// Per-user chat bucket.
    pub chat: TokenBuckets,
    /// Per-user tool bucket.
    pub tool: TokenBuckets,
    /// Per-user export bucket.
    pub export: TokenBuckets,
    /// Per-IP artifact retrieval bucket.
    pub artifact: TokenBuckets,
    /// Per-IP global bucket, checked before any endpoint bucket.
    pub ip: TokenBuckets,
}

impl RateLimiter {
    pub fn from_config(rates: &RatesConfig) -> Self {
        Self {
            chat: TokenBuckets::per_minute(rates.chat_per_min),
            tool: TokenBuckets::per_minute(rates.tool_per_min),
            export: TokenBuckets::per_minute(rates.export_per_min),
            artifact: TokenBuckets::per_minute(rates.artifact_per_min),
            ip: TokenBuckets::per_minute(rates.ip_per_min),
        }
    }

    pub fn prune_idle(&self) {
        self.chat.prune_idle();
        self.tool.prune_idle();
        self.export.prune_idle();
        self.artifact.prune_idle();
        self.ip.prune_idle();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn capacity_requests_pass_then_deny() {
        let buckets = TokenBuckets::per_minute(20.0);
        let t0 = Instant::now();

        for _ in 0..20 {
            assert!(buckets.allow_at("u-1", t0).allowed);
        }
        let denied = buckets.allow_at("u-1", t0);
        assert!(!denied.allowed);
        assert!(denied.retry_after >= 1);
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let buckets = TokenBuckets::per_minute(20.0);
        let t0 = Instant::now();
        for _ in 0..20 {
            buckets.allow_at("u-1", t0);
        }
        assert!(!buckets.allow_at("u-1", t0).allowed);

        // 20/min refills one token every 3 seconds.
        let t1 = t0 + Duration::from_secs(4);
        assert!(buckets.allow_at("u-1", t1).allowed);
        assert!(!buckets.allow_at("u-1", t1).allowed);
    }

    #[test]
    fn refill_clamps_at_capacity() {
        let buckets = TokenBuckets::per_minute(5.0);
        let t0 = Instant::now();
        buckets.allow_at("u-1", t0);

        // A long idle period must not overfill past capacity.
        let t1 = t0 + Duration::from_secs(3_600);
        for _ in 0..5 {
            assert!(buckets.allow_at("u-1", t1).allowed);
        }
        assert!(!buckets.allow_at("u-1", t1).allowed);
    }

    #[test]
    fn retry_after_reflects_deficit() {
        // 1/min: one token every 60 seconds.
        let buckets = TokenBuckets::per_minute(1.0);
        let t0 = Instant::now();
        assert!(buckets.allow_at("u-1", t0).allowed);

        let denied = buckets.allow_at("u-1", t0);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, 60);
    }

    #[test]
    fn keys_are_independent() {
        let buckets = TokenBuckets::per_minute(1.0);
        let t0 = Instant::now();
        assert!(buckets.allow_at("u-1", t0).allowed);
        assert!(buckets.allow_at("u-2", t0).allowed);
        assert!(!buckets.allow_at("u-1", t0).allowed);
    }

    #[test]
    fn idle_buckets_are_pruned_full_ones_kept() {
        let buckets = TokenBuckets::per_minute(60.0);
        let t0 = Instant::now();
        buckets.allow_at("busy", t0);
        buckets.allow_at("idle", t0);
        assert_eq!(buckets.tracked_keys(), 2);

        // After two seconds both have refilled fully (1 token/sec).
        buckets.prune_idle_at(t0 + Duration::from_secs(2));
        assert_eq!(buckets.tracked_keys(), 0);

        // A still-draining bucket survives.
        buckets.allow_at("busy", t0 + Duration::from_secs(10));
        buckets.prune_idle_at(t0 + Duration::from_secs(10));
        assert_eq!(buckets.tracked_keys(), 1);
    }
}
