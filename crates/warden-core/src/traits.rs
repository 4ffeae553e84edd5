//! Gate trait definitions for the Warden enforcement pipeline.
//!
//! Five gates and one untrusted collaborator define the trust boundary:
//!
//! - `RateLimiter`    : per-client token buckets (pure, in memory)
//! - `InputValidator` : structural checks and sanitization of parameters
//! - `BudgetLedger`   : per-role daily spend in two currencies (durable)
//! - `PolicyHooks`    : role-scoped authorization of tools, commands, paths
//! - `AuditSink`      : append-only record of every pass and every denial
//! - `ToolAction`     : the gated external action itself (untrusted)
//!
//! Every gate speaks `WardenResult`. The pipeline converts gate outcomes into
//! a `PolicyDecision` in exactly one place, and a `ToolAction` is never
//! executed unless every gate returned `Ok`.

use serde::{Deserialize, Serialize};

use warden_contracts::{
    audit::{AuditEntry, SecurityNotice, ToolCall, ToolOutcome},
    budget::{BudgetRecord, BudgetSummary},
    error::WardenResult,
    policy::{PolicyDecision, ToolInvocation},
    role::AgentRole,
};

/// Per-client throttling. The first gate of every pass.
pub trait RateLimiter: Send + Sync {
    /// Consume one token from the client's global bucket, then one from the
    /// client's bucket for `tool_name`.
    ///
    /// A token taken from the global bucket stays spent even when the tool
    /// bucket then refuses.
    fn check_limit(&self, client_id: &str, tool_name: &str) -> WardenResult<()>;
}

/// Structural validation and sanitization of raw tool parameters.
pub trait InputValidator: Send + Sync {
    /// Return the parameter set that may be passed on to the action.
    ///
    /// Fields not expected for a known tool are dropped. The returned value
    /// replaces the raw parameters for the rest of the pass.
    fn sanitize(&self, tool_name: &str, params: &serde_json::Value)
        -> WardenResult<serde_json::Value>;
}

/// Daily per-role spend accounting.
///
/// Implementations are shared between the policy hooks (which check) and the
/// pipeline (which records), so they must be safe behind an `Arc`.
pub trait BudgetLedger: Send + Sync {
    /// Deny when today's API cost or native spend has reached its ceiling.
    fn check_budget(&self, role: AgentRole) -> WardenResult<()>;

    /// Add one metered API call of `cost_usd` to today's record.
    fn record_api_call(&self, role: AgentRole, cost_usd: f64) -> WardenResult<BudgetRecord>;

    /// Add one on-chain spend of `amount` native tokens to today's record.
    fn record_spend(&self, role: AgentRole, amount: f64) -> WardenResult<BudgetRecord>;

    fn summary(&self, role: AgentRole) -> WardenResult<BudgetSummary>;

    fn all_summaries(&self) -> WardenResult<Vec<BudgetSummary>>;
}

/// Role-scoped authorization: the last gate before the action runs.
pub trait PolicyHooks: Send + Sync {
    /// Evaluate budget, shell command, write path and spend authority, in
    /// that order. The first failing check wins.
    fn evaluate(&self, invocation: &ToolInvocation, role: AgentRole) -> WardenResult<()>;

    /// The host-facing form of `evaluate`.
    fn pre_tool_use(&self, invocation: &ToolInvocation, role: AgentRole) -> PolicyDecision {
        PolicyDecision::from_result(&self.evaluate(invocation, role))
    }

    /// Document a finished (or denied) call. Has no side effects and cannot
    /// deny.
    fn post_tool_use(
        &self,
        invocation: &ToolInvocation,
        role: AgentRole,
        outcome: ToolOutcome,
        duration_ms: u64,
        error: Option<&str>,
    ) -> AuditEntry;
}

/// Where audit records and security events go.
///
/// Infallible by contract: a sink that cannot persist a record reports the
/// failure on its own channel and returns normally.
pub trait AuditSink: Send + Sync {
    fn log_tool_call(&self, call: ToolCall);

    fn log_security_event(&self, notice: SecurityNotice);
}

/// What an executed action reports back to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Result handed back to the caller unchanged.
    pub output: serde_json::Value,
    /// Metered API cost incurred, in dollars.
    pub api_cost_usd: Option<f64>,
    /// Native tokens spent on chain.
    pub native_spent: Option<f64>,
    /// Transaction reference, if one was submitted.
    pub tx_signature: Option<String>,
}

impl ActionReport {
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn with_api_cost(mut self, usd: f64) -> Self {
        self.api_cost_usd = Some(usd);
        self
    }

    pub fn with_spend(mut self, amount: f64, tx_signature: impl Into<String>) -> Self {
        self.native_spent = Some(amount);
        self.tx_signature = Some(tx_signature.into());
        self
    }
}

/// The gated external action.
///
/// Considered untrusted: the pipeline only calls `execute` after every gate
/// has passed, and its error string is recorded verbatim.
pub trait ToolAction {
    fn execute(&self, invocation: &ToolInvocation) -> Result<ActionReport, String>;
}

impl<F> ToolAction for F
where
    F: Fn(&ToolInvocation) -> Result<ActionReport, String>,
{
    fn execute(&self, invocation: &ToolInvocation) -> Result<ActionReport, String> {
        self(invocation)
    }
}
