//! Durable budget record stores.
//!
//! A store only ever applies increments; it never overwrites a record with a
//! value computed elsewhere. That keeps concurrent writers from losing each
//! other's spend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use warden_contracts::{
    budget::{BudgetDelta, BudgetRecord},
    error::{WardenError, WardenResult},
    role::AgentRole,
};

pub trait BudgetStore: Send + Sync {
    /// The record for `(role, day)`, if one was ever written.
    fn load(&self, role: AgentRole, day: NaiveDate) -> WardenResult<Option<BudgetRecord>>;

    /// Atomically add `delta` to the record for `(role, day)`, creating it at
    /// zero first if needed, and return the updated record.
    fn increment(
        &self,
        role: AgentRole,
        day: NaiveDate,
        delta: &BudgetDelta,
    ) -> WardenResult<BudgetRecord>;

    /// Every record written for `day`.
    fn records_for_day(&self, day: NaiveDate) -> WardenResult<Vec<BudgetRecord>>;

    /// Delete every record dated strictly before `cutoff`. Returns the count.
    fn prune_before(&self, cutoff: NaiveDate) -> WardenResult<usize>;
}

/// Process-local store. Used in tests and by single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryBudgetStore {
    records: Mutex<BTreeMap<(AgentRole, NaiveDate), BudgetRecord>>,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> WardenResult<MutexGuard<'_, BTreeMap<(AgentRole, NaiveDate), BudgetRecord>>> {
        self.records.lock().map_err(|_| WardenError::Store {
            reason: "in-memory budget store lock poisoned".to_string(),
        })
    }
}

impl BudgetStore for InMemoryBudgetStore {
    fn load(&self, role: AgentRole, day: NaiveDate) -> WardenResult<Option<BudgetRecord>> {
        Ok(self.lock()?.get(&(role, day)).cloned())
    }

    fn increment(
        &self,
        role: AgentRole,
        day: NaiveDate,
        delta: &BudgetDelta,
    ) -> WardenResult<BudgetRecord> {
        let mut records = self.lock()?;
        let record = records
            .entry((role, day))
            .or_insert_with(|| BudgetRecord::empty(role, day));
        record.apply(delta);
        Ok(record.clone())
    }

    fn records_for_day(&self, day: NaiveDate) -> WardenResult<Vec<BudgetRecord>> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.date == day)
            .cloned()
            .collect())
    }

    fn prune_before(&self, cutoff: NaiveDate) -> WardenResult<usize> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|(_, day), _| *day >= cutoff);
        Ok(before - records.len())
    }
}
