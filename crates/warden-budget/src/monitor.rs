//! The budget monitor: daily ceilings checked against a durable store.
//!
//! The two currencies are checked separately. Headroom in one never covers
//! an overrun in the other.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use warden_contracts::{
    budget::{
        micros_to_usd, lamports_to_native, native_to_lamports, usd_to_micros, BudgetDelta,
        BudgetLimits, BudgetRecord, BudgetSummary,
    },
    error::{WardenError, WardenResult},
    role::AgentRole,
};
use warden_core::{traits::BudgetLedger, Clock};

use crate::limits::BudgetConfig;
use crate::store::BudgetStore;

pub struct BudgetMonitor {
    store: Arc<dyn BudgetStore>,
    config: BudgetConfig,
    clock: Arc<dyn Clock>,
}

impl BudgetMonitor {
    pub fn new(
        store: Arc<dyn BudgetStore>,
        config: BudgetConfig,
        clock: Arc<dyn Clock>,
    ) -> WardenResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    fn today_record(&self, role: AgentRole) -> WardenResult<BudgetRecord> {
        let today = self.clock.today();
        Ok(self
            .store
            .load(role, today)?
            .unwrap_or_else(|| BudgetRecord::empty(role, today)))
    }

    /// Check today's spend against explicit ceilings instead of the
    /// configured ones.
    pub fn check_budget_with(&self, role: AgentRole, limits: &BudgetLimits) -> WardenResult<()> {
        let record = self.today_record(role)?;

        if record.api_cost_micros >= limits.max_api_cost_micros {
            warn!(
                role = %role,
                spent_usd = micros_to_usd(record.api_cost_micros),
                max_usd = micros_to_usd(limits.max_api_cost_micros),
                "daily API budget exhausted"
            );
            return Err(WardenError::BudgetExceeded {
                reason: format!(
                    "daily API budget for {} used: ${}/${}",
                    role,
                    micros_to_usd(record.api_cost_micros),
                    micros_to_usd(limits.max_api_cost_micros)
                ),
            });
        }

        if record.native_spent_lamports >= limits.max_native_lamports {
            warn!(
                role = %role,
                spent = lamports_to_native(record.native_spent_lamports),
                max = lamports_to_native(limits.max_native_lamports),
                "daily native spend budget exhausted"
            );
            return Err(WardenError::BudgetExceeded {
                reason: format!(
                    "daily native spend budget for {} used: {}/{}",
                    role,
                    lamports_to_native(record.native_spent_lamports),
                    lamports_to_native(limits.max_native_lamports)
                ),
            });
        }

        Ok(())
    }

    /// Delete records older than `keep_days` before today.
    pub fn prune_old_records(&self, keep_days: u32) -> WardenResult<usize> {
        let cutoff = self.clock.today() - Duration::days(i64::from(keep_days));
        let pruned = self.store.prune_before(cutoff)?;
        if pruned > 0 {
            info!(pruned, cutoff = %cutoff, "pruned old budget records");
        }
        Ok(pruned)
    }

    /// Prune with the configured retention window.
    pub fn prune_expired(&self) -> WardenResult<usize> {
        self.prune_old_records(self.config.retention_days)
    }
}

impl BudgetLedger for BudgetMonitor {
    fn check_budget(&self, role: AgentRole) -> WardenResult<()> {
        let limits = self.config.limits_for(role)?;
        self.check_budget_with(role, &limits)
    }

    fn record_api_call(&self, role: AgentRole, cost_usd: f64) -> WardenResult<BudgetRecord> {
        let micros = usd_to_micros(cost_usd)?;
        let record = self
            .store
            .increment(role, self.clock.today(), &BudgetDelta::api_call(micros))?;
        debug!(role = %role, cost_micros = micros, total_micros = record.api_cost_micros, "recorded api call");
        Ok(record)
    }

    fn record_spend(&self, role: AgentRole, amount: f64) -> WardenResult<BudgetRecord> {
        let lamports = native_to_lamports(amount)?;
        let record = self
            .store
            .increment(role, self.clock.today(), &BudgetDelta::spend(lamports))?;
        debug!(role = %role, lamports, total_lamports = record.native_spent_lamports, "recorded native spend");
        Ok(record)
    }

    fn summary(&self, role: AgentRole) -> WardenResult<BudgetSummary> {
        Ok(BudgetSummary {
            record: self.today_record(role)?,
            limits: self.config.limits_for(role)?,
        })
    }

    fn all_summaries(&self) -> WardenResult<Vec<BudgetSummary>> {
        let today = self.clock.today();
        let mut recorded = self.store.records_for_day(today)?;
        AgentRole::ALL
            .iter()
            .map(|role| {
                let record = match recorded.iter().position(|r| r.role == *role) {
                    Some(idx) => recorded.swap_remove(idx),
                    None => BudgetRecord::empty(*role, today),
                };
                Ok(BudgetSummary {
                    record,
                    limits: self.config.limits_for(*role)?,
                })
            })
            .collect()
    }
}
