//! In-memory `LogWriter` for tests.

use std::sync::Mutex;

use chrono::NaiveDate;

use warden_contracts::{
    audit::LogCategory,
    error::{WardenError, WardenResult},
};

use crate::writer::LogWriter;

#[derive(Debug, Default)]
pub struct InMemoryLogWriter {
    lines: Mutex<Vec<(LogCategory, NaiveDate, String)>>,
    fail_writes: bool,
}

impl InMemoryLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose every append fails, for exercising the swallow path.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// All lines in `category`, across days, parsed back.
    pub fn entries(&self, category: LogCategory) -> Vec<serde_json::Value> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(c, _, _)| *c == category)
            .filter_map(|(_, _, line)| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogWriter for InMemoryLogWriter {
    fn append(&self, category: LogCategory, date: NaiveDate, line: &str) -> WardenResult<()> {
        if self.fail_writes {
            return Err(WardenError::LoggingFailure {
                reason: "in-memory writer configured to fail".to_string(),
            });
        }
        let mut lines = self.lines.lock().map_err(|e| WardenError::LoggingFailure {
            reason: format!("log buffer lock poisoned: {}", e),
        })?;
        lines.push((category, date, line.to_string()));
        Ok(())
    }

    fn read_entries(
        &self,
        category: LogCategory,
        date: NaiveDate,
    ) -> WardenResult<Vec<serde_json::Value>> {
        let lines = self.lines.lock().map_err(|e| WardenError::LoggingFailure {
            reason: format!("log buffer lock poisoned: {}", e),
        })?;
        Ok(lines
            .iter()
            .filter(|(c, d, _)| *c == category && *d == date)
            .filter_map(|(_, _, line)| serde_json::from_str(line).ok())
            .collect())
    }
}
