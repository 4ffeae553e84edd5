//! The per-client, two-level token-bucket limiter.
//!
//! Every client owns one global bucket and one bucket per tool it has used.
//! Buckets are created lazily on first use and evicted once idle, so memory
//! tracks the set of recently active clients rather than every client ever
//! seen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};

use warden_contracts::{
    error::{WardenError, WardenResult},
    policy::strip_external_prefix,
};
use warden_core::{traits::RateLimiter, Clock};

use crate::bucket::{BucketStatus, TokenBucket};
use crate::profile::LimiterConfig;

/// Scope name reported when the global bucket refuses.
pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Default)]
struct LimiterState {
    global: HashMap<String, TokenBucket>,
    tools: HashMap<String, HashMap<String, TokenBucket>>,
    last_sweep_ms: i64,
}

/// Both buckets a call would draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitStatus {
    pub global: BucketStatus,
    pub tool: BucketStatus,
}

pub struct TokenBucketLimiter {
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl TokenBucketLimiter {
    /// Build a limiter, rejecting profiles that could never admit a call.
    pub fn new(config: LimiterConfig, clock: Arc<dyn Clock>) -> WardenResult<Self> {
        config.validate()?;
        let state = LimiterState {
            last_sweep_ms: clock.now_millis(),
            ..LimiterState::default()
        };
        Ok(Self {
            config,
            clock,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    fn lock(&self) -> WardenResult<MutexGuard<'_, LimiterState>> {
        self.state.lock().map_err(|_| WardenError::Internal {
            reason: "rate limiter state lock poisoned".to_string(),
        })
    }

    /// Current level of both buckets for a (client, tool) pair.
    ///
    /// Does not create buckets: a client never seen reports full buckets.
    pub fn status(&self, client_id: &str, tool_name: &str) -> WardenResult<LimitStatus> {
        let tool = strip_external_prefix(tool_name);
        let now = self.clock.now_millis();
        let state = self.lock()?;

        let view = |existing: Option<&TokenBucket>, fresh: TokenBucket| {
            let mut bucket = existing.cloned().unwrap_or(fresh);
            bucket.refill(now);
            bucket.status()
        };

        Ok(LimitStatus {
            global: view(
                state.global.get(client_id),
                TokenBucket::new(self.config.global, now),
            ),
            tool: view(
                state.tools.get(client_id).and_then(|t| t.get(tool)),
                TokenBucket::new(self.config.profile_for(tool), now),
            ),
        })
    }

    /// Evict every bucket idle for longer than the configured horizon.
    /// Returns the number of buckets removed.
    pub fn sweep(&self) -> WardenResult<usize> {
        let now = self.clock.now_millis();
        let mut state = self.lock()?;
        Ok(self.sweep_locked(&mut state, now))
    }

    fn sweep_locked(&self, state: &mut LimiterState, now: i64) -> usize {
        let horizon = self.config.idle_horizon_ms;
        let before = self.bucket_count_locked(state);

        state.global.retain(|_, b| !b.is_idle(now, horizon));
        for buckets in state.tools.values_mut() {
            buckets.retain(|_, b| !b.is_idle(now, horizon));
        }
        state.tools.retain(|_, buckets| !buckets.is_empty());
        state.last_sweep_ms = now;

        let evicted = before - self.bucket_count_locked(state);
        if evicted > 0 {
            info!(evicted, "swept idle rate-limit buckets");
        }
        evicted
    }

    /// Number of live buckets, global and per-tool.
    pub fn bucket_count(&self) -> WardenResult<usize> {
        let state = self.lock()?;
        Ok(self.bucket_count_locked(&state))
    }

    fn bucket_count_locked(&self, state: &LimiterState) -> usize {
        state.global.len() + state.tools.values().map(HashMap::len).sum::<usize>()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check_limit(&self, client_id: &str, tool_name: &str) -> WardenResult<()> {
        let tool = strip_external_prefix(tool_name);
        let now = self.clock.now_millis();
        let mut state = self.lock()?;

        if now.saturating_sub(state.last_sweep_ms) >= self.config.sweep_interval_ms as i64 {
            self.sweep_locked(&mut state, now);
        }

        let global = state
            .global
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.global, now));
        if let Err(retry_after_ms) = global.try_consume(now) {
            debug!(client = %client_id, tool = %tool, retry_after_ms, "global rate limit hit");
            return Err(WardenError::RateLimited {
                scope: GLOBAL_SCOPE.to_string(),
                retry_after_ms,
            });
        }

        // The global token stays spent if the tool bucket refuses below.
        let profile = self.config.profile_for(tool);
        let bucket = state
            .tools
            .entry(client_id.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_insert_with(|| TokenBucket::new(profile, now));
        bucket.try_consume(now).map_err(|retry_after_ms| {
            debug!(client = %client_id, tool = %tool, retry_after_ms, "tool rate limit hit");
            WardenError::RateLimited {
                scope: tool.to_string(),
                retry_after_ms,
            }
        })
    }
}
