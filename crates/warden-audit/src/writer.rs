//! Append-only, day-partitioned JSONL log files.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use warden_contracts::{
    audit::LogCategory,
    error::{WardenError, WardenResult},
};

/// Destination for serialized log lines.
pub trait LogWriter: Send + Sync {
    /// Append one line (without its trailing newline) to the file for
    /// `category` on `date`.
    fn append(&self, category: LogCategory, date: NaiveDate, line: &str) -> WardenResult<()>;

    /// Every line written for `category` on `date`, parsed back.
    fn read_entries(
        &self,
        category: LogCategory,
        date: NaiveDate,
    ) -> WardenResult<Vec<serde_json::Value>>;
}

/// Writes `{dir}/{category}-{YYYY-MM-DD}.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlLogWriter {
    dir: PathBuf,
}

impl JsonlLogWriter {
    /// The directory is created on first write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, category: LogCategory, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.jsonl", category.as_str(), date.format("%Y-%m-%d")))
    }
}

fn log_failure(path: &Path, e: impl std::fmt::Display) -> WardenError {
    WardenError::LoggingFailure {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl LogWriter for JsonlLogWriter {
    fn append(&self, category: LogCategory, date: NaiveDate, line: &str) -> WardenResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| log_failure(&self.dir, e))?;

        let path = self.path_for(category, date);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| log_failure(&path, e))?;

        // One write per record so concurrent appenders do not interleave
        // within a line.
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes())
            .map_err(|e| log_failure(&path, e))
    }

    fn read_entries(
        &self,
        category: LogCategory,
        date: NaiveDate,
    ) -> WardenResult<Vec<serde_json::Value>> {
        let path = self.path_for(category, date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| log_failure(&path, e))?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| log_failure(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line).map_err(|e| log_failure(&path, e))?);
        }
        Ok(entries)
    }
}
