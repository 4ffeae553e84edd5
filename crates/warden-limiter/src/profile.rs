//! Rate-limit profiles and the built-in per-tool table.
//!
//! Cheap reads get a large bucket that refills fast; spend-triggering writes
//! get a small bucket that refills slowly. Tools missing from the table fall
//! back to the `default` profile.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use warden_contracts::error::{WardenError, WardenResult};

/// Capacity and refill schedule of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitProfile {
    /// Maximum tokens the bucket can hold. Also its starting level.
    pub capacity: u32,
    /// Tokens added per elapsed interval.
    pub refill_rate: u32,
    pub refill_interval_ms: u64,
}

impl RateLimitProfile {
    pub const fn new(capacity: u32, refill_rate: u32, refill_interval_ms: u64) -> Self {
        Self {
            capacity,
            refill_rate,
            refill_interval_ms,
        }
    }

    /// Reject profiles that could never refill or never admit a call.
    pub fn validate(&self, scope: &str) -> WardenResult<()> {
        if self.capacity == 0 || self.refill_rate == 0 || self.refill_interval_ms == 0 {
            return Err(WardenError::Config {
                reason: format!(
                    "rate limit profile '{}' needs non-zero capacity, refill_rate and refill_interval_ms",
                    scope
                ),
            });
        }
        Ok(())
    }
}

/// Applied to every call of a client, whatever the tool.
pub const GLOBAL_PROFILE: RateLimitProfile = RateLimitProfile::new(300, 30, 6_000);

/// Applied to tools with no entry of their own.
pub const DEFAULT_PROFILE: RateLimitProfile = RateLimitProfile::new(100, 10, 6_000);

/// Built-in per-tool profiles.
pub const DEFAULT_TOOL_PROFILES: &[(&str, RateLimitProfile)] = &[
    // Marketplace writes.
    ("create_task", RateLimitProfile::new(10, 1, 6_000)),
    ("submit_result", RateLimitProfile::new(20, 2, 6_000)),
    ("submit_result_zk", RateLimitProfile::new(10, 1, 6_000)),
    ("accept_result", RateLimitProfile::new(20, 2, 6_000)),
    ("dispute_task", RateLimitProfile::new(5, 1, 12_000)),
    // Marketplace reads.
    ("search_services", RateLimitProfile::new(60, 10, 10_000)),
    ("get_service", RateLimitProfile::new(120, 20, 10_000)),
    ("get_task", RateLimitProfile::new(120, 20, 10_000)),
    ("list_my_tasks", RateLimitProfile::new(30, 5, 10_000)),
    ("get_balance", RateLimitProfile::new(60, 10, 10_000)),
    // External scanning.
    ("scan_wallet", RateLimitProfile::new(20, 2, 6_000)),
    // Team writes.
    ("create_team", RateLimitProfile::new(10, 1, 6_000)),
    ("create_team_task", RateLimitProfile::new(20, 2, 6_000)),
    ("assign_subtask", RateLimitProfile::new(30, 3, 6_000)),
    ("complete_subtask", RateLimitProfile::new(30, 3, 6_000)),
    ("submit_team_result", RateLimitProfile::new(10, 1, 6_000)),
    ("distribute_payment", RateLimitProfile::new(10, 1, 6_000)),
    ("update_team_context", RateLimitProfile::new(30, 3, 6_000)),
    // Team reads.
    ("get_team", RateLimitProfile::new(120, 20, 10_000)),
    ("list_teams", RateLimitProfile::new(60, 10, 10_000)),
    ("get_team_task", RateLimitProfile::new(120, 20, 10_000)),
    ("list_team_tasks", RateLimitProfile::new(60, 10, 10_000)),
    ("get_team_context", RateLimitProfile::new(60, 10, 10_000)),
];

/// Full limiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    pub global: RateLimitProfile,
    pub default: RateLimitProfile,
    /// Keyed by tool name without any external prefix.
    pub tools: HashMap<String, RateLimitProfile>,
    /// How often `check_limit` sweeps idle buckets.
    pub sweep_interval_ms: u64,
    /// A bucket not refilled for this long is evicted, once it would be full
    /// again.
    pub idle_horizon_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            global: GLOBAL_PROFILE,
            default: DEFAULT_PROFILE,
            tools: DEFAULT_TOOL_PROFILES
                .iter()
                .map(|(name, profile)| (name.to_string(), *profile))
                .collect(),
            sweep_interval_ms: 60_000,
            idle_horizon_ms: 10 * 60_000,
        }
    }
}

impl LimiterConfig {
    pub fn profile_for(&self, tool: &str) -> RateLimitProfile {
        self.tools.get(tool).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> WardenResult<()> {
        self.global.validate("global")?;
        self.default.validate("default")?;
        for (name, profile) in &self.tools {
            profile.validate(name)?;
        }
        Ok(())
    }
}
