//! # warden-limiter
//!
//! Per-client token-bucket rate limiting for the Warden pipeline.
//!
//! Refill is computed lazily on access, so buckets that are never queried
//! cost nothing. Buckets are process-local and never shared between agent
//! processes.

pub mod bucket;
pub mod limiter;
pub mod profile;

pub use bucket::{BucketStatus, TokenBucket};
pub use limiter::{LimitStatus, TokenBucketLimiter, GLOBAL_SCOPE};
pub use profile::{LimiterConfig, RateLimitProfile, DEFAULT_PROFILE, GLOBAL_PROFILE};

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use warden_contracts::error::WardenError;
    use warden_core::{traits::RateLimiter, ManualClock};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()))
    }

    fn limiter_with(config: LimiterConfig, clock: &Arc<ManualClock>) -> TokenBucketLimiter {
        TokenBucketLimiter::new(config, clock.clone()).unwrap()
    }

    fn config_with_tool(name: &str, profile: RateLimitProfile) -> LimiterConfig {
        let mut config = LimiterConfig::default();
        config.tools.insert(name.to_string(), profile);
        config
    }

    // ── TokenBucket ──────────────────────────────────────────────────────────

    #[test]
    fn bucket_starts_full_and_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(RateLimitProfile::new(5, 2, 1_000), 0);
        assert_eq!(bucket.tokens(), 5);

        bucket.refill(1_000_000);
        assert_eq!(bucket.tokens(), 5);

        for _ in 0..5 {
            bucket.try_consume(1_000_000).unwrap();
        }
        assert_eq!(bucket.tokens(), 0);
        assert!(bucket.try_consume(1_000_000).is_err());
        assert_eq!(bucket.tokens(), 0);
    }

    #[test]
    fn refill_keeps_partial_interval_progress() {
        let mut bucket = TokenBucket::new(RateLimitProfile::new(1, 1, 1_000), 0);
        bucket.try_consume(0).unwrap();

        // 1.5 intervals: one token, and half an interval carried over.
        bucket.refill(1_500);
        assert_eq!(bucket.tokens(), 1);
        assert_eq!(bucket.last_refill_ms(), 1_000);

        bucket.try_consume(1_500).unwrap();
        // Only another half interval is needed now.
        bucket.refill(2_000);
        assert_eq!(bucket.tokens(), 1);
    }

    #[test]
    fn clock_going_backwards_refills_nothing() {
        let mut bucket = TokenBucket::new(RateLimitProfile::new(2, 1, 1_000), 10_000);
        bucket.try_consume(10_000).unwrap();
        bucket.refill(5_000);
        assert_eq!(bucket.tokens(), 1);
        assert_eq!(bucket.last_refill_ms(), 10_000);
    }

    #[test]
    fn retry_after_rounds_up_to_whole_intervals() {
        let mut bucket = TokenBucket::new(RateLimitProfile::new(1, 1, 12_000), 0);
        bucket.try_consume(0).unwrap();
        assert_eq!(bucket.try_consume(500), Err(12_000));
        assert_eq!(bucket.status().retry_after_ms, 12_000);
    }

    #[test]
    fn bucket_level_stays_in_bounds_over_a_long_run() {
        let profile = RateLimitProfile::new(7, 3, 250);
        let mut bucket = TokenBucket::new(profile, 0);
        let mut now = 0i64;
        for step in 0..2_000i64 {
            now += (step * 37) % 400;
            let _ = bucket.try_consume(now);
            assert!(bucket.tokens() <= profile.capacity);
        }
    }

    // ── TokenBucketLimiter ───────────────────────────────────────────────────

    /// 21 calls to a 20/1 tool inside one interval: the 21st is refused, and
    /// waiting the reported retry-after lets the next call through.
    #[test]
    fn twenty_first_call_is_refused_until_one_interval_passes() {
        let clock = clock();
        let limiter = limiter_with(
            config_with_tool("deploy_preview", RateLimitProfile::new(20, 1, 60_000)),
            &clock,
        );

        for _ in 0..20 {
            limiter.check_limit("ops-session", "deploy_preview").unwrap();
        }

        let err = limiter.check_limit("ops-session", "deploy_preview").unwrap_err();
        let retry_after = match err {
            WardenError::RateLimited { scope, retry_after_ms } => {
                assert_eq!(scope, "deploy_preview");
                assert!(retry_after_ms > 0);
                retry_after_ms
            }
            other => panic!("expected RateLimited, got {:?}", other),
        };

        clock.advance_ms(retry_after as i64);
        limiter.check_limit("ops-session", "deploy_preview").unwrap();
    }

    #[test]
    fn global_bucket_is_checked_first_and_shared_across_tools() {
        let clock = clock();
        let mut config = LimiterConfig::default();
        config.global = RateLimitProfile::new(3, 1, 60_000);
        let limiter = limiter_with(config, &clock);

        limiter.check_limit("c1", "get_task").unwrap();
        limiter.check_limit("c1", "get_service").unwrap();
        limiter.check_limit("c1", "search_services").unwrap();

        match limiter.check_limit("c1", "get_balance").unwrap_err() {
            WardenError::RateLimited { scope, .. } => assert_eq!(scope, GLOBAL_SCOPE),
            other => panic!("expected global RateLimited, got {:?}", other),
        }

        // Another client has its own buckets.
        limiter.check_limit("c2", "get_balance").unwrap();
    }

    #[test]
    fn global_token_stays_spent_when_tool_bucket_refuses() {
        let clock = clock();
        let mut config = config_with_tool("dispute_task", RateLimitProfile::new(1, 1, 12_000));
        config.global = RateLimitProfile::new(10, 1, 60_000);
        let limiter = limiter_with(config, &clock);

        limiter.check_limit("c1", "dispute_task").unwrap();
        assert!(limiter.check_limit("c1", "dispute_task").is_err());

        let status = limiter.status("c1", "dispute_task").unwrap();
        assert_eq!(status.global.tokens, 8);
        assert_eq!(status.tool.tokens, 0);
    }

    #[test]
    fn external_prefix_shares_the_tool_bucket() {
        let clock = clock();
        let limiter = limiter_with(
            config_with_tool("create_task", RateLimitProfile::new(2, 1, 6_000)),
            &clock,
        );

        limiter.check_limit("c1", "create_task").unwrap();
        limiter.check_limit("c1", "mcp__agentpay__create_task").unwrap();
        assert!(limiter.check_limit("c1", "mcp__agentpay__create_task").is_err());
    }

    #[test]
    fn unknown_tools_use_the_default_profile() {
        let config = LimiterConfig::default();
        assert_eq!(config.profile_for("no_such_tool"), DEFAULT_PROFILE);
        assert_eq!(config.profile_for("dispute_task").capacity, 5);
        assert_eq!(config.profile_for("get_service").capacity, 120);
    }

    #[test]
    fn status_does_not_create_buckets() {
        let clock = clock();
        let limiter = limiter_with(LimiterConfig::default(), &clock);

        let status = limiter.status("never-seen", "create_task").unwrap();
        assert_eq!(status.global.tokens, GLOBAL_PROFILE.capacity);
        assert_eq!(status.tool.tokens, 10);
        assert_eq!(limiter.bucket_count().unwrap(), 0);
    }

    #[test]
    fn idle_buckets_are_swept() {
        let clock = clock();
        let limiter = limiter_with(LimiterConfig::default(), &clock);

        limiter.check_limit("idle-client", "get_task").unwrap();
        assert_eq!(limiter.bucket_count().unwrap(), 2);

        clock.advance_ms(5 * 60_000);
        assert_eq!(limiter.sweep().unwrap(), 0);

        clock.advance_ms(6 * 60_000);
        assert_eq!(limiter.sweep().unwrap(), 2);
        assert_eq!(limiter.bucket_count().unwrap(), 0);
    }

    #[test]
    fn depleted_slow_bucket_survives_the_sweep() {
        let clock = clock();
        // Refills once every 20 minutes, longer than the 10 minute horizon.
        let config = config_with_tool("slow_tool", RateLimitProfile::new(2, 1, 20 * 60_000));
        let limiter = limiter_with(config, &clock);

        limiter.check_limit("client", "slow_tool").unwrap();
        limiter.check_limit("client", "slow_tool").unwrap();
        assert!(limiter.check_limit("client", "slow_tool").is_err());

        clock.advance_ms(11 * 60_000);
        // The full global bucket goes; the empty tool bucket stays.
        assert_eq!(limiter.sweep().unwrap(), 1);
        let err = limiter.check_limit("client", "slow_tool").unwrap_err();
        assert!(matches!(err, WardenError::RateLimited { .. }));

        clock.advance_ms(10 * 60_000);
        assert!(limiter.check_limit("client", "slow_tool").is_ok());
    }

    #[test]
    fn check_limit_sweeps_lazily() {
        let clock = clock();
        let limiter = limiter_with(LimiterConfig::default(), &clock);

        limiter.check_limit("old-client", "get_task").unwrap();
        clock.advance_ms(11 * 60_000);
        limiter.check_limit("new-client", "get_task").unwrap();

        // Only the new client's two buckets survive.
        assert_eq!(limiter.bucket_count().unwrap(), 2);
    }

    #[test]
    fn zero_capacity_profile_is_a_config_error() {
        let clock = clock();
        let config = config_with_tool("broken", RateLimitProfile::new(0, 1, 1_000));
        let err = TokenBucketLimiter::new(config, clock).err().unwrap();
        assert!(matches!(err, WardenError::Config { .. }));
    }
}
