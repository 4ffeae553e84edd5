//! A single token bucket with lazy, whole-interval refill.

use serde::Serialize;

use crate::profile::RateLimitProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucket {
    tokens: u32,
    profile: RateLimitProfile,
    last_refill_ms: i64,
}

/// Point-in-time view of a bucket, for debugging and operator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketStatus {
    pub tokens: u32,
    pub capacity: u32,
    /// Zero when a token is available now.
    pub retry_after_ms: u64,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(profile: RateLimitProfile, now_ms: i64) -> Self {
        Self {
            tokens: profile.capacity,
            profile,
            last_refill_ms: now_ms,
        }
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn last_refill_ms(&self) -> i64 {
        self.last_refill_ms
    }

    /// Credit every whole interval elapsed since the last refill.
    ///
    /// `last_refill_ms` only advances by whole intervals, so time already
    /// spent toward the next refill is kept. A clock that moved backwards
    /// refills nothing.
    pub fn refill(&mut self, now_ms: i64) {
        let elapsed = now_ms - self.last_refill_ms;
        if elapsed <= 0 {
            return;
        }
        let interval = self.profile.refill_interval_ms.max(1);
        let intervals = elapsed as u64 / interval;
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(u64::from(self.profile.refill_rate));
        let level = u64::from(self.tokens).saturating_add(added);
        self.tokens = level.min(u64::from(self.profile.capacity)) as u32;

        let advance = intervals.saturating_mul(interval);
        self.last_refill_ms = self
            .last_refill_ms
            .saturating_add(i64::try_from(advance).unwrap_or(i64::MAX));
    }

    /// Take one token, or return how long to wait before one is available.
    pub fn try_consume(&mut self, now_ms: i64) -> Result<(), u64> {
        self.refill(now_ms);
        if self.tokens >= 1 {
            self.tokens -= 1;
            Ok(())
        } else {
            Err(self.retry_after_ms())
        }
    }

    /// Whole refill intervals needed to reach one token.
    pub fn retry_after_ms(&self) -> u64 {
        if self.tokens >= 1 {
            return 0;
        }
        let deficit = u64::from(1 - self.tokens);
        let rate = u64::from(self.profile.refill_rate.max(1));
        let intervals = (deficit + rate - 1) / rate;
        intervals * self.profile.refill_interval_ms
    }

    pub fn status(&self) -> BucketStatus {
        BucketStatus {
            tokens: self.tokens,
            capacity: self.profile.capacity,
            retry_after_ms: self.retry_after_ms(),
        }
    }

    /// True when the bucket has not been refilled for longer than `horizon_ms`
    /// and would be back at capacity by `now_ms`. Evicting it then loses
    /// nothing, because a fresh bucket starts full.
    pub fn is_idle(&self, now_ms: i64, horizon_ms: u64) -> bool {
        let idle = now_ms.saturating_sub(self.last_refill_ms);
        if idle <= 0 || idle as u64 <= horizon_ms {
            return false;
        }
        let mut projected = self.clone();
        projected.refill(now_ms);
        projected.tokens >= projected.profile.capacity
    }
}
