//! Budget records, ceilings and currency conversion.
//!
//! Both currencies are held as integer minor units. Ceilings compare exactly
//! (a role sitting one micro-dollar under its ceiling is allowed, a role at
//! the ceiling is not), which floating-point accumulation cannot promise.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationKind, WardenError, WardenResult};
use crate::role::AgentRole;

/// 1 USD = 1 000 000 micros.
pub const MICROS_PER_USD: u64 = 1_000_000;

/// 1 native token = 1 000 000 000 lamports.
pub const LAMPORTS_PER_NATIVE: u64 = 1_000_000_000;

/// Convert a dollar amount to micros, rounding to the nearest micro.
pub fn usd_to_micros(usd: f64) -> WardenResult<u64> {
    to_minor_units(usd, MICROS_PER_USD, "cost_usd")
}

/// Convert a native-token amount to lamports, rounding to the nearest lamport.
pub fn native_to_lamports(amount: f64) -> WardenResult<u64> {
    to_minor_units(amount, LAMPORTS_PER_NATIVE, "native_amount")
}

pub fn micros_to_usd(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_USD as f64
}

pub fn lamports_to_native(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_NATIVE as f64
}

fn to_minor_units(value: f64, scale: u64, field: &str) -> WardenResult<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(WardenError::ValidationFailed {
            field: field.to_string(),
            reason: format!("amount must be a finite, non-negative number, got {}", value),
            kind: ValidationKind::Malformed,
        });
    }
    let scaled = (value * scale as f64).round();
    if scaled > u64::MAX as f64 {
        return Err(WardenError::ValidationFailed {
            field: field.to_string(),
            reason: "amount is too large".to_string(),
            kind: ValidationKind::Malformed,
        });
    }
    Ok(scaled as u64)
}

/// Accumulated spend for one role on one UTC calendar day.
///
/// Exactly one live record exists per (role, day). Records for past days are
/// never touched again once the day rolls over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub role: AgentRole,
    pub date: NaiveDate,
    pub api_cost_micros: u64,
    pub native_spent_lamports: u64,
    /// Number of metered API calls recorded today.
    pub api_calls: u64,
    /// Number of on-chain transactions recorded today.
    pub on_chain_tx_count: u64,
}

impl BudgetRecord {
    /// A zeroed record, used before the first increment of the day.
    pub fn empty(role: AgentRole, date: NaiveDate) -> Self {
        Self {
            role,
            date,
            api_cost_micros: 0,
            native_spent_lamports: 0,
            api_calls: 0,
            on_chain_tx_count: 0,
        }
    }

    pub fn apply(&mut self, delta: &BudgetDelta) {
        self.api_cost_micros = self.api_cost_micros.saturating_add(delta.api_cost_micros);
        self.native_spent_lamports = self
            .native_spent_lamports
            .saturating_add(delta.native_lamports);
        self.api_calls = self.api_calls.saturating_add(delta.api_calls);
        self.on_chain_tx_count = self.on_chain_tx_count.saturating_add(delta.on_chain_txs);
    }

    pub fn api_cost_usd(&self) -> f64 {
        micros_to_usd(self.api_cost_micros)
    }

    pub fn native_spent(&self) -> f64 {
        lamports_to_native(self.native_spent_lamports)
    }
}

/// An increment applied atomically to one budget record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetDelta {
    pub api_cost_micros: u64,
    pub native_lamports: u64,
    pub api_calls: u64,
    pub on_chain_txs: u64,
}

impl BudgetDelta {
    /// One metered API call costing `micros`.
    pub fn api_call(micros: u64) -> Self {
        Self {
            api_cost_micros: micros,
            api_calls: 1,
            ..Self::default()
        }
    }

    /// One on-chain transaction spending `lamports`.
    pub fn spend(lamports: u64) -> Self {
        Self {
            native_lamports: lamports,
            on_chain_txs: 1,
            ..Self::default()
        }
    }
}

/// Daily ceilings for one role, one per currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimits {
    pub max_api_cost_micros: u64,
    pub max_native_lamports: u64,
}

impl BudgetLimits {
    /// Build limits from whole-unit amounts (dollars and native tokens).
    pub fn from_units(max_usd: f64, max_native: f64) -> WardenResult<Self> {
        Ok(Self {
            max_api_cost_micros: usd_to_micros(max_usd)?,
            max_native_lamports: native_to_lamports(max_native)?,
        })
    }
}

/// Read-only snapshot of one role's day, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub record: BudgetRecord,
    pub limits: BudgetLimits,
}

impl BudgetSummary {
    pub fn api_remaining_micros(&self) -> u64 {
        self.limits
            .max_api_cost_micros
            .saturating_sub(self.record.api_cost_micros)
    }

    pub fn native_remaining_lamports(&self) -> u64 {
        self.limits
            .max_native_lamports
            .saturating_sub(self.record.native_spent_lamports)
    }

    /// True once either currency has reached its ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.record.api_cost_micros >= self.limits.max_api_cost_micros
            || self.record.native_spent_lamports >= self.limits.max_native_lamports
    }
}
