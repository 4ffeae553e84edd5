//! The hook engine: budget, shell, write and spend checks for one tool call.

use std::sync::Arc;

use tracing::{debug, warn};

use warden_contracts::{
    audit::{AuditEntry, ToolOutcome},
    capability::CapabilityProfile,
    error::{ValidationKind, WardenError, WardenResult},
    policy::ToolInvocation,
    role::AgentRole,
};
use warden_core::{
    traits::{BudgetLedger, PolicyHooks},
    Clock,
};

use crate::command::CommandPolicy;
use crate::config::PolicyConfig;
use crate::path::PathPolicy;

pub struct HookEngine {
    config: PolicyConfig,
    commands: CommandPolicy,
    paths: PathPolicy,
    budget: Arc<dyn BudgetLedger>,
    clock: Arc<dyn Clock>,
}

impl HookEngine {
    /// Compile every pattern up front. A bad pattern is a `Config` error.
    pub fn new(
        config: PolicyConfig,
        budget: Arc<dyn BudgetLedger>,
        clock: Arc<dyn Clock>,
    ) -> WardenResult<Self> {
        let commands = CommandPolicy::new(
            &config.blocked_commands,
            &config.credential_patterns,
            &config.capabilities,
        )?;
        let paths = PathPolicy::new(
            &config.protected_paths,
            &config.shared_write_prefixes,
            config.workspace_root.as_deref(),
        )?;

        Ok(Self {
            config,
            commands,
            paths,
            budget,
            clock,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Shell checks alone, without the budget gate.
    pub fn check_command(&self, command: &str, role: AgentRole) -> WardenResult<()> {
        self.commands.check(command, role, self.profile(role)?)
    }

    /// Write-path checks alone, without the budget gate.
    pub fn check_write_path(&self, path: &str, role: AgentRole) -> WardenResult<()> {
        self.paths.check(path, role, self.profile(role)?)
    }

    fn profile(&self, role: AgentRole) -> WardenResult<&CapabilityProfile> {
        self.config
            .capabilities
            .profile(role)
            .ok_or_else(|| WardenError::Unauthorized {
                reason: format!("no capability profile for role {}", role),
            })
    }

    /// A spend tool is one of ours: bare, or behind the payment server prefix.
    fn is_spend_tool(&self, tool_name: &str) -> bool {
        let base = tool_name
            .strip_prefix(self.config.external_tool_prefix.as_str())
            .unwrap_or(tool_name);
        self.config.spend_tools.contains(base)
    }
}

impl PolicyHooks for HookEngine {
    fn evaluate(&self, invocation: &ToolInvocation, role: AgentRole) -> WardenResult<()> {
        self.budget.check_budget(role)?;

        let profile = self.profile(role)?;
        let tool = invocation.tool_name.as_str();

        if self.config.shell_tools.contains(tool) {
            let command = invocation
                .str_param("command")
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| missing("command"))?;
            self.commands.check(command, role, profile)?;
        }

        if self.config.write_tools.contains(tool) {
            let path = invocation
                .str_param("file_path")
                .or_else(|| invocation.str_param("path"))
                .ok_or_else(|| missing("file_path"))?;
            self.paths.check(path, role, profile)?;
        }

        if self.is_spend_tool(tool) && !profile.can_spend {
            warn!(role = %role, tool = %tool, "spend attempted without authority");
            return Err(WardenError::Unauthorized {
                reason: format!("{} agent cannot perform spending operations", role),
            });
        }

        debug!(role = %role, tool = %tool, "hooks passed");
        Ok(())
    }

    fn post_tool_use(
        &self,
        invocation: &ToolInvocation,
        role: AgentRole,
        outcome: ToolOutcome,
        duration_ms: u64,
        error: Option<&str>,
    ) -> AuditEntry {
        AuditEntry {
            timestamp: self.clock.now(),
            role,
            tool: invocation.tool_name.clone(),
            params: invocation.params.clone(),
            outcome,
            duration_ms,
            error: error.map(str::to_string),
        }
    }
}

fn missing(field: &str) -> WardenError {
    WardenError::ValidationFailed {
        field: field.to_string(),
        reason: "is required".to_string(),
        kind: ValidationKind::Malformed,
    }
}
