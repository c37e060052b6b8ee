// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Trust-scaled per-peer rate limiting, generalizing the teacher
//! keystore's single-rate `RateLimiter` to a token bucket whose refill
//! rate and burst scale by [`TrustLevel`].

use super::registry::TrustLevel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

fn multiplier(level: TrustLevel) -> Option<f64> {
    match level {
        TrustLevel::Untrusted => Some(0.0),
        TrustLevel::Limited => Some(0.25),
        TrustLevel::Standard => Some(1.0),
        TrustLevel::Trusted => Some(4.0),
        TrustLevel::Admin => None, // unlimited
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-peer trust-scaled token bucket limiter.
pub struct PeerRateLimiter {
    base_per_second: f64,
    base_burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl PeerRateLimiter {
    /// Construct a limiter from the configured default per-second rate
    /// and burst size (spec.md §6: `network.max_messages_per_second`,
    /// `network.rate_limit_burst`).
    pub fn new(base_per_second: u32, base_burst: u32) -> Self {
        Self {
            base_per_second: base_per_second as f64,
            base_burst: base_burst as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// `Allow(peerID, cost=1) -> bool`. `Admin` peers are always allowed
    /// and never consume a bucket.
    pub fn allow(&self, peer_id: &str, level: TrustLevel, cost: u32) -> bool {
        let Some(mult) = multiplier(level) else { return true };
        if mult <= 0.0 {
            return false;
        }

        let refill_per_sec = self.base_per_second * mult;
        let burst = (self.base_burst * mult).max(1.0);

        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(peer_id.to_string()).or_insert_with(|| Bucket {
            tokens: burst,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = elapsed.as_secs_f64() * refill_per_sec;
        if refill > 0.0 {
            bucket.tokens = (bucket.tokens + refill).min(burst);
            bucket.last_refill = now;
        }

        let cost = cost as f64;
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for longer than `max_idle` (best-effort memory bound).
    pub fn sweep(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < max_idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_always_allowed() {
        let limiter = PeerRateLimiter::new(1, 1);
        for _ in 0..100 {
            assert!(limiter.allow("admin-peer", TrustLevel::Admin, 1));
        }
    }

    #[test]
    fn untrusted_is_never_allowed() {
        let limiter = PeerRateLimiter::new(100, 50);
        assert!(!limiter.allow("bad-peer", TrustLevel::Untrusted, 1));
    }

    #[test]
    fn burst_exhausts_then_refuses() {
        let limiter = PeerRateLimiter::new(1, 2);
        assert!(limiter.allow("peer", TrustLevel::Standard, 1));
        assert!(limiter.allow("peer", TrustLevel::Standard, 1));
        assert!(!limiter.allow("peer", TrustLevel::Standard, 1));
    }

    #[test]
    fn trusted_gets_larger_burst_than_standard() {
        let limiter_trusted = PeerRateLimiter::new(1, 2);
        let mut allowed = 0;
        for _ in 0..8 {
            if limiter_trusted.allow("peer", TrustLevel::Trusted, 1) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 8); // burst = 2 * 4x = 8
    }
}
