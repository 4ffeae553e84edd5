//! SQLite-backed budget store shared by every agent process on a host.
//!
//! Each increment is one `INSERT ... ON CONFLICT DO UPDATE SET x = x + ?`
//! statement, so two processes recording spend for the same role in the
//! same instant both land. WAL mode plus a busy timeout lets concurrent
//! writers queue instead of failing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use warden_contracts::{
    budget::{BudgetDelta, BudgetRecord},
    error::{WardenError, WardenResult},
    role::AgentRole,
};

use crate::store::BudgetStore;

const DAY_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS budget_records (
        role TEXT NOT NULL,
        day TEXT NOT NULL,
        api_cost_micros INTEGER NOT NULL DEFAULT 0,
        native_spent_lamports INTEGER NOT NULL DEFAULT 0,
        api_calls INTEGER NOT NULL DEFAULT 0,
        on_chain_tx_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (role, day)
    );
    CREATE INDEX IF NOT EXISTS idx_budget_records_day ON budget_records (day);
";

const INCREMENT: &str = "
    INSERT INTO budget_records
        (role, day, api_cost_micros, native_spent_lamports, api_calls, on_chain_tx_count)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(role, day) DO UPDATE SET
        api_cost_micros = api_cost_micros + excluded.api_cost_micros,
        native_spent_lamports = native_spent_lamports + excluded.native_spent_lamports,
        api_calls = api_calls + excluded.api_calls,
        on_chain_tx_count = on_chain_tx_count + excluded.on_chain_tx_count
    RETURNING role, day, api_cost_micros, native_spent_lamports, api_calls, on_chain_tx_count
";

const COLUMNS: &str =
    "role, day, api_cost_micros, native_spent_lamports, api_calls, on_chain_tx_count";

pub struct SqliteBudgetStore {
    conn: Mutex<Connection>,
}

/// One row as stored, before conversion back to unsigned amounts.
struct RawRecord {
    role: String,
    day: String,
    api_cost_micros: i64,
    native_spent_lamports: i64,
    api_calls: i64,
    on_chain_tx_count: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            role: row.get(0)?,
            day: row.get(1)?,
            api_cost_micros: row.get(2)?,
            native_spent_lamports: row.get(3)?,
            api_calls: row.get(4)?,
            on_chain_tx_count: row.get(5)?,
        })
    }

    fn into_record(self) -> WardenResult<BudgetRecord> {
        Ok(BudgetRecord {
            role: self.role.parse().map_err(|_| WardenError::Store {
                reason: format!("unknown role '{}' in budget store", self.role),
            })?,
            date: NaiveDate::parse_from_str(&self.day, DAY_FORMAT).map_err(|e| {
                WardenError::Store {
                    reason: format!("bad day '{}' in budget store: {}", self.day, e),
                }
            })?,
            api_cost_micros: from_db(self.api_cost_micros)?,
            native_spent_lamports: from_db(self.native_spent_lamports)?,
            api_calls: from_db(self.api_calls)?,
            on_chain_tx_count: from_db(self.on_chain_tx_count)?,
        })
    }
}

impl SqliteBudgetStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> WardenResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| WardenError::Store {
                reason: format!("cannot create budget directory {}: {}", parent.display(), e),
            })?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        debug!(path = %path.display(), "opened budget store");
        Self::init(conn)
    }

    /// A private in-memory database. Used in tests.
    pub fn open_in_memory() -> WardenResult<Self> {
        Self::init(Connection::open_in_memory().map_err(store_err)?)
    }

    fn init(conn: Connection) -> WardenResult<Self> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(store_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> WardenResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| WardenError::Store {
            reason: "budget store connection lock poisoned".to_string(),
        })
    }
}

impl BudgetStore for SqliteBudgetStore {
    fn load(&self, role: AgentRole, day: NaiveDate) -> WardenResult<Option<BudgetRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM budget_records WHERE role = ?1 AND day = ?2",
                    COLUMNS
                ),
                params![role.as_str(), day_key(day)],
                RawRecord::from_row,
            )
            .optional()
            .map_err(store_err)?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn increment(
        &self,
        role: AgentRole,
        day: NaiveDate,
        delta: &BudgetDelta,
    ) -> WardenResult<BudgetRecord> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                INCREMENT,
                params![
                    role.as_str(),
                    day_key(day),
                    to_db(delta.api_cost_micros)?,
                    to_db(delta.native_lamports)?,
                    to_db(delta.api_calls)?,
                    to_db(delta.on_chain_txs)?,
                ],
                RawRecord::from_row,
            )
            .map_err(store_err)?;
        raw.into_record()
    }

    fn records_for_day(&self, day: NaiveDate) -> WardenResult<Vec<BudgetRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM budget_records WHERE day = ?1 ORDER BY role",
                COLUMNS
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![day_key(day)], RawRecord::from_row)
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        rows.into_iter().map(RawRecord::into_record).collect()
    }

    fn prune_before(&self, cutoff: NaiveDate) -> WardenResult<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM budget_records WHERE day < ?1",
            params![day_key(cutoff)],
        )
        .map_err(store_err)
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

fn store_err(e: rusqlite::Error) -> WardenError {
    WardenError::Store {
        reason: e.to_string(),
    }
}

fn to_db(value: u64) -> WardenResult<i64> {
    i64::try_from(value).map_err(|_| WardenError::Store {
        reason: format!("amount {} does not fit the budget store", value),
    })
}

fn from_db(value: i64) -> WardenResult<u64> {
    u64::try_from(value).map_err(|_| WardenError::Store {
        reason: format!("negative amount {} in budget store", value),
    })
}
