//! # warden-budget
//!
//! Daily per-role budget accounting for the Warden pipeline.
//!
//! Spend is tracked in two independent currencies (metered API cost and
//! on-chain native tokens), stored as integer minor units, and persisted in
//! a `BudgetStore`. The SQLite store is the one to share between agent
//! processes; the in-memory store is for tests and single-process use.

pub mod limits;
pub mod monitor;
pub mod sqlite;
pub mod store;

pub use limits::{default_limits, BudgetConfig, DEFAULT_RETENTION_DAYS};
pub use monitor::BudgetMonitor;
pub use sqlite::SqliteBudgetStore;
pub use store::{BudgetStore, InMemoryBudgetStore};
