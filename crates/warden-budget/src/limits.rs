//! Per-role daily ceilings.
//!
//! Leads carry higher ceilings than the specialists who report to them.

use std::collections::BTreeMap;

use warden_contracts::{
    budget::{BudgetLimits, LAMPORTS_PER_NATIVE, MICROS_PER_USD},
    error::{WardenError, WardenResult},
    role::AgentRole,
};

/// Days of records kept by `prune_expired`.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Whole dollars and thousandths of a native token.
fn limits(usd: u64, native_milli: u64) -> BudgetLimits {
    BudgetLimits {
        max_api_cost_micros: usd * MICROS_PER_USD,
        max_native_lamports: native_milli * (LAMPORTS_PER_NATIVE / 1_000),
    }
}

/// Built-in ceiling for one role.
pub fn default_limits(role: AgentRole) -> BudgetLimits {
    match role {
        AgentRole::Ops | AgentRole::Dev | AgentRole::Web3 => limits(10, 500),
        AgentRole::Frontend => limits(8, 100),
        AgentRole::Backend => limits(8, 300),
        AgentRole::Marketing => limits(5, 100),
        AgentRole::Content | AgentRole::Social => limits(4, 50),
        AgentRole::Analytics | AgentRole::Research => limits(3, 50),
        AgentRole::Sales => limits(5, 200),
        AgentRole::Outreach | AgentRole::Proposals => limits(4, 100),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetConfig {
    pub limits: BTreeMap<AgentRole, BudgetLimits>,
    pub retention_days: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            limits: AgentRole::ALL
                .iter()
                .map(|role| (*role, default_limits(*role)))
                .collect(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl BudgetConfig {
    pub fn limits_for(&self, role: AgentRole) -> WardenResult<BudgetLimits> {
        self.limits
            .get(&role)
            .copied()
            .ok_or_else(|| WardenError::Config {
                reason: format!("no budget limits configured for role '{}'", role),
            })
    }

    pub fn validate(&self) -> WardenResult<()> {
        for role in AgentRole::ALL {
            self.limits_for(role)?;
        }
        Ok(())
    }
}
