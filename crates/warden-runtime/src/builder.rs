//! Assembly of a complete pipeline from a `WardenConfig`.

use std::sync::Arc;

use tracing::info;

use warden_audit::{AuditLogger, InMemoryLogWriter, JsonlLogWriter, LogWriter};
use warden_budget::{BudgetMonitor, BudgetStore, InMemoryBudgetStore, SqliteBudgetStore};
use warden_contracts::error::WardenResult;
use warden_core::{Clock, Pipeline, SystemClock};
use warden_limiter::TokenBucketLimiter;
use warden_policy::HookEngine;
use warden_validate::ToolInputValidator;

use crate::config::WardenConfig;

/// A built pipeline plus handles to the shared pieces operators query
/// directly.
pub struct Warden {
    pipeline: Pipeline,
    budget: Arc<BudgetMonitor>,
    audit: Arc<AuditLogger>,
    config: WardenConfig,
}

impl Warden {
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn budget(&self) -> &Arc<BudgetMonitor> {
        &self.budget
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }
}

/// Builds a `Warden`. Storage defaults to SQLite and JSONL files under the
/// configured state directory; either can be replaced.
pub struct WardenBuilder {
    config: WardenConfig,
    clock: Arc<dyn Clock>,
    budget_store: Option<Arc<dyn BudgetStore>>,
    log_writer: Option<Arc<dyn LogWriter>>,
}

impl WardenBuilder {
    pub fn new(config: WardenConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            budget_store: None,
            log_writer: None,
        }
    }

    /// Everything in memory: nothing touches the filesystem.
    pub fn in_memory(config: WardenConfig) -> Self {
        Self::new(config)
            .with_budget_store(Arc::new(InMemoryBudgetStore::new()))
            .with_log_writer(Arc::new(InMemoryLogWriter::new()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_budget_store(mut self, store: Arc<dyn BudgetStore>) -> Self {
        self.budget_store = Some(store);
        self
    }

    pub fn with_log_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.log_writer = Some(writer);
        self
    }

    /// Compile and validate everything. Any bad setting is a `Config` error
    /// here, never later.
    pub fn build(self) -> WardenResult<Warden> {
        let config = self.config;
        let clock = self.clock;

        let limiter = TokenBucketLimiter::new(config.limiter_config()?, clock.clone())?;
        let validator = ToolInputValidator::new(config.validator_config()?)?;

        let store: Arc<dyn BudgetStore> = match self.budget_store {
            Some(store) => store,
            None => Arc::new(SqliteBudgetStore::open(config.budget_db_path())?),
        };
        let budget = Arc::new(BudgetMonitor::new(
            store,
            config.budget_config()?,
            clock.clone(),
        )?);

        let hooks = HookEngine::new(config.policy_config()?, budget.clone(), clock.clone())?;

        let writer: Arc<dyn LogWriter> = match self.log_writer {
            Some(writer) => writer,
            None => Arc::new(JsonlLogWriter::new(config.log_dir())),
        };
        let audit = Arc::new(AuditLogger::new(
            writer,
            config.audit_config()?,
            clock.clone(),
        ));

        let pipeline = Pipeline::new(
            Box::new(limiter),
            Box::new(validator),
            Box::new(hooks),
            budget.clone(),
            audit.clone(),
            clock,
        );

        info!(state_dir = %config.state_dir().display(), "warden pipeline assembled");

        Ok(Warden {
            pipeline,
            budget,
            audit,
            config,
        })
    }
}
