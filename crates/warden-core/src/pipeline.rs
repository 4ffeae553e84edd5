//! The Warden pipeline: the ordered gate runner for one tool invocation.
//!
//! The pipeline enforces the control flow:
//!
//!   Limiter → Validator → Hooks (budget, command, path, spend) → [Action]
//!     → Budget record → Post-tool-use → Audit
//!
//! The security invariant is absolute: `ToolAction::execute()` is NEVER
//! called unless every gate returned `Ok`. Any gate error, including an
//! internal one, becomes a denial. Every pass produces exactly one audit
//! record, and every denial additionally produces one security event.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use warden_contracts::{
    audit::{AuditEntry, SecurityNotice, ToolCall, ToolOutcome},
    error::{WardenError, WardenResult},
    policy::{PolicyDecision, ToolInvocation, ToolRequest},
};

use crate::clock::Clock;
use crate::traits::{
    ActionReport, AuditSink, BudgetLedger, InputValidator, PolicyHooks, RateLimiter, ToolAction,
};

/// How one pass through the pipeline ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every gate passed and the action succeeded.
    Executed {
        output: serde_json::Value,
        entry: AuditEntry,
    },
    /// Every gate passed but the action itself returned an error.
    Failed { error: String, entry: AuditEntry },
    /// A gate refused. The action never ran.
    Denied {
        decision: PolicyDecision,
        entry: AuditEntry,
    },
}

impl PipelineOutcome {
    pub fn entry(&self) -> &AuditEntry {
        match self {
            PipelineOutcome::Executed { entry, .. }
            | PipelineOutcome::Failed { entry, .. }
            | PipelineOutcome::Denied { entry, .. } => entry,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, PipelineOutcome::Denied { .. })
    }
}

/// The gate runner shared by every tool call of one agent process.
pub struct Pipeline {
    limiter: Box<dyn RateLimiter>,
    validator: Box<dyn InputValidator>,
    hooks: Box<dyn PolicyHooks>,
    budget: Arc<dyn BudgetLedger>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        limiter: Box<dyn RateLimiter>,
        validator: Box<dyn InputValidator>,
        hooks: Box<dyn PolicyHooks>,
        budget: Arc<dyn BudgetLedger>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            validator,
            hooks,
            budget,
            audit,
            clock,
        }
    }

    /// The budget ledger, for spend recording and reporting outside a pass.
    pub fn budget(&self) -> &Arc<dyn BudgetLedger> {
        &self.budget
    }

    pub fn hooks(&self) -> &dyn PolicyHooks {
        self.hooks.as_ref()
    }

    /// Run the gates in order and return the sanitized invocation.
    ///
    /// No side effects beyond token consumption; nothing is logged.
    pub fn admit(&self, request: &ToolRequest) -> WardenResult<ToolInvocation> {
        let tool = request.tool_name();

        // ── Gate 1: Rate limit ───────────────────────────────────────────────
        self.limiter.check_limit(&request.client_id, tool)?;

        // ── Gate 2: Input validation ─────────────────────────────────────────
        //
        // The sanitized parameters replace the raw ones for the rest of the
        // pass, so the hooks judge exactly what the action will receive.
        let params = self.validator.sanitize(tool, &request.invocation.params)?;
        let admitted = ToolInvocation::new(tool, params);

        // ── Gate 3: Authorization hooks ──────────────────────────────────────
        self.hooks.evaluate(&admitted, request.role)?;

        debug!(
            tool = %tool,
            role = %request.role,
            "all gates passed"
        );
        Ok(admitted)
    }

    /// Gate a call the host will execute itself.
    ///
    /// Denials are logged here; the host reports the eventual outcome through
    /// `record_outcome`.
    pub fn check(&self, request: &ToolRequest) -> PolicyDecision {
        let admitted = self.admit(request);
        let decision = PolicyDecision::from_result(&admitted);
        if let Err(err) = &admitted {
            self.deny(request, err, &decision);
        }
        decision
    }

    /// Log the outcome of a call that was admitted through `check`.
    pub fn record_outcome(
        &self,
        request: &ToolRequest,
        outcome: ToolOutcome,
        duration_ms: u64,
        error: Option<&str>,
    ) -> AuditEntry {
        let entry = self.hooks.post_tool_use(
            &request.invocation,
            request.role,
            outcome,
            duration_ms,
            error,
        );
        self.audit.log_tool_call(self.tool_call(request, &entry, None));
        entry
    }

    /// Execute one tool invocation end to end.
    ///
    /// # Pipeline
    ///
    /// 1. `admit()`: limiter, validator, hooks. Any `Err` is a denial:
    ///    audit + security event, return `PipelineOutcome::Denied`.
    /// 2. Call `action.execute()` on the sanitized invocation. **Only
    ///    reachable after step 1 passes.**
    /// 3. On success, record metered cost and native spend against the
    ///    role's budget. A failed record is logged, never surfaced.
    /// 4. Build the post-tool-use entry and log it as the single audit
    ///    record for the pass.
    pub fn run(&self, request: &ToolRequest, action: &dyn ToolAction) -> PipelineOutcome {
        // ── Step 1: Gates ────────────────────────────────────────────────────
        let admitted = self.admit(request);
        let decision = PolicyDecision::from_result(&admitted);
        let admitted = match admitted {
            Ok(admitted) => admitted,
            Err(err) => {
                let entry = self.deny(request, &err, &decision);
                return PipelineOutcome::Denied { decision, entry };
            }
        };

        // ── Step 2: Action ───────────────────────────────────────────────────
        let started = self.clock.now();
        let result = action.execute(&admitted);
        let duration_ms = (self.clock.now() - started).num_milliseconds().max(0) as u64;

        match result {
            Ok(report) => {
                // ── Step 3: Budget record ────────────────────────────────────
                self.record_spend(request, &report);

                // ── Step 4: Post-tool-use + audit ────────────────────────────
                let entry = self.hooks.post_tool_use(
                    &admitted,
                    request.role,
                    ToolOutcome::Success,
                    duration_ms,
                    None,
                );
                self.audit
                    .log_tool_call(self.tool_call(request, &entry, report.tx_signature.clone()));

                PipelineOutcome::Executed {
                    output: report.output,
                    entry,
                }
            }
            Err(error) => {
                warn!(
                    tool = %admitted.tool_name,
                    role = %request.role,
                    error = %error,
                    "gated action failed"
                );
                let entry = self.hooks.post_tool_use(
                    &admitted,
                    request.role,
                    ToolOutcome::Error,
                    duration_ms,
                    Some(&error),
                );
                self.audit.log_tool_call(self.tool_call(request, &entry, None));

                PipelineOutcome::Failed { error, entry }
            }
        }
    }

    fn deny(&self, request: &ToolRequest, err: &WardenError, decision: &PolicyDecision) -> AuditEntry {
        warn!(
            tool = %request.tool_name(),
            role = %request.role,
            event = err.event_name(),
            reason = %err,
            "tool call denied"
        );

        let entry = self.hooks.post_tool_use(
            &request.invocation,
            request.role,
            ToolOutcome::Denied,
            0,
            decision.reason.as_deref(),
        );
        self.audit.log_tool_call(self.tool_call(request, &entry, None));

        let notice = SecurityNotice::new(
            err.event_name(),
            err.severity(),
            json!({
                "tool": request.tool_name(),
                "reason": err.to_string(),
                "retry_after_ms": err.retry_after_ms(),
            }),
        )
        .with_role(request.role)
        .with_client(request.client_id.clone(), request.client_addr.clone());
        self.audit.log_security_event(notice);

        entry
    }

    fn record_spend(&self, request: &ToolRequest, report: &ActionReport) {
        if let Some(cost) = report.api_cost_usd {
            if let Err(e) = self.budget.record_api_call(request.role, cost) {
                warn!(role = %request.role, cost_usd = cost, error = %e, "failed to record api cost");
            }
        }
        if let Some(amount) = report.native_spent {
            if let Err(e) = self.budget.record_spend(request.role, amount) {
                warn!(role = %request.role, amount, error = %e, "failed to record native spend");
            }
        }
    }

    fn tool_call(&self, request: &ToolRequest, entry: &AuditEntry, tx: Option<String>) -> ToolCall {
        ToolCall {
            client_id: Some(request.client_id.clone()),
            client_addr: request.client_addr.clone(),
            tx_signature: tx,
            ..ToolCall::from_entry(entry)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use warden_contracts::{
        audit::{AuditEntry, SecurityNotice, Severity, ToolCall, ToolOutcome},
        budget::{BudgetLimits, BudgetRecord, BudgetSummary},
        error::{ValidationKind, WardenError, WardenResult},
        policy::{ToolInvocation, ToolRequest},
        role::AgentRole,
    };

    use crate::clock::{Clock, ManualClock};
    use crate::traits::{
        ActionReport, AuditSink, BudgetLedger, InputValidator, PolicyHooks, RateLimiter,
    };

    use super::{Pipeline, PipelineOutcome};

    // ── Mock helpers ─────────────────────────────────────────────────────────

    fn make_request(tool: &str) -> ToolRequest {
        ToolRequest::new(
            AgentRole::Backend,
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
            tool,
            json!({ "query": "translation" }),
        )
        .with_client_addr("10.0.0.7")
    }

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()))
    }

    /// A limiter that either always passes or always refuses.
    struct MockLimiter {
        deny: bool,
    }

    impl RateLimiter for MockLimiter {
        fn check_limit(&self, _client_id: &str, tool_name: &str) -> WardenResult<()> {
            if self.deny {
                Err(WardenError::RateLimited {
                    scope: tool_name.to_string(),
                    retry_after_ms: 6000,
                })
            } else {
                Ok(())
            }
        }
    }

    /// A validator that tags the params it passes, or rejects them.
    struct MockValidator {
        reject: bool,
    }

    impl InputValidator for MockValidator {
        fn sanitize(
            &self,
            _tool_name: &str,
            params: &serde_json::Value,
        ) -> WardenResult<serde_json::Value> {
            if self.reject {
                return Err(WardenError::ValidationFailed {
                    field: "query".to_string(),
                    reason: "matches a forbidden pattern".to_string(),
                    kind: ValidationKind::ForbiddenPattern,
                });
            }
            let mut clean = params.clone();
            clean["sanitized"] = json!(true);
            Ok(clean)
        }
    }

    /// Hooks that return a pre-configured result and record what they saw.
    struct MockHooks {
        result: fn() -> WardenResult<()>,
        seen: Arc<Mutex<Vec<ToolInvocation>>>,
    }

    impl MockHooks {
        fn allowing() -> Self {
            Self {
                result: || Ok(()),
                seen: Arc::new(Mutex::new(vec![])),
            }
        }

        fn returning(result: fn() -> WardenResult<()>) -> Self {
            Self {
                result,
                seen: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl PolicyHooks for MockHooks {
        fn evaluate(&self, invocation: &ToolInvocation, _role: AgentRole) -> WardenResult<()> {
            self.seen.lock().unwrap().push(invocation.clone());
            (self.result)()
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
                timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
                role,
                tool: invocation.tool_name.clone(),
                params: invocation.params.clone(),
                outcome,
                duration_ms,
                error: error.map(str::to_string),
            }
        }
    }

    /// A ledger that records increments and can be told to fail them.
    #[derive(Default)]
    struct MockBudget {
        api_calls: Mutex<Vec<f64>>,
        spends: Mutex<Vec<f64>>,
        fail_records: bool,
    }

    impl BudgetLedger for MockBudget {
        fn check_budget(&self, _role: AgentRole) -> WardenResult<()> {
            Ok(())
        }

        fn record_api_call(&self, role: AgentRole, cost_usd: f64) -> WardenResult<BudgetRecord> {
            if self.fail_records {
                return Err(WardenError::Store { reason: "database is locked".into() });
            }
            self.api_calls.lock().unwrap().push(cost_usd);
            Ok(BudgetRecord::empty(role, Utc::now().date_naive()))
        }

        fn record_spend(&self, role: AgentRole, amount: f64) -> WardenResult<BudgetRecord> {
            if self.fail_records {
                return Err(WardenError::Store { reason: "database is locked".into() });
            }
            self.spends.lock().unwrap().push(amount);
            Ok(BudgetRecord::empty(role, Utc::now().date_naive()))
        }

        fn summary(&self, role: AgentRole) -> WardenResult<BudgetSummary> {
            Ok(BudgetSummary {
                record: BudgetRecord::empty(role, Utc::now().date_naive()),
                limits: BudgetLimits { max_api_cost_micros: 1, max_native_lamports: 1 },
            })
        }

        fn all_summaries(&self) -> WardenResult<Vec<BudgetSummary>> {
            Ok(vec![])
        }
    }

    /// An audit sink that keeps everything in memory.
    #[derive(Default)]
    struct MockAudit {
        calls: Mutex<Vec<ToolCall>>,
        events: Mutex<Vec<SecurityNotice>>,
    }

    impl AuditSink for MockAudit {
        fn log_tool_call(&self, call: ToolCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn log_security_event(&self, notice: SecurityNotice) {
            self.events.lock().unwrap().push(notice);
        }
    }

    struct Harness {
        pipeline: Pipeline,
        budget: Arc<MockBudget>,
        audit: Arc<MockAudit>,
        clock: Arc<ManualClock>,
    }

    fn harness(limiter: MockLimiter, validator: MockValidator, hooks: MockHooks) -> Harness {
        harness_with_budget(limiter, validator, hooks, MockBudget::default())
    }

    fn harness_with_budget(
        limiter: MockLimiter,
        validator: MockValidator,
        hooks: MockHooks,
        budget: MockBudget,
    ) -> Harness {
        let budget = Arc::new(budget);
        let audit = Arc::new(MockAudit::default());
        let clock = manual_clock();
        let pipeline = Pipeline::new(
            Box::new(limiter),
            Box::new(validator),
            Box::new(hooks),
            budget.clone(),
            audit.clone(),
            clock.clone(),
        );
        Harness { pipeline, budget, audit, clock }
    }

    // ── Test cases ────────────────────────────────────────────────────────────

    /// Core security test: a rate-limit denial must prevent the action from
    /// running and must still be logged as a security event.
    #[test]
    fn test_rate_limit_blocks_action() {
        let h = harness(
            MockLimiter { deny: true },
            MockValidator { reject: false },
            MockHooks::allowing(),
        );
        let runs = Mutex::new(0u32);
        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            *runs.lock().unwrap() += 1;
            Ok(ActionReport::default())
        };

        let outcome = h.pipeline.run(&make_request("search_services"), &action);

        assert_eq!(*runs.lock().unwrap(), 0, "action must not run on denial");
        match outcome {
            PipelineOutcome::Denied { decision, entry } => {
                assert!(!decision.allow);
                assert_eq!(decision.retry_after_ms, Some(6000));
                assert_eq!(entry.outcome, ToolOutcome::Denied);
            }
            other => panic!("expected Denied, got {:?}", other),
        }

        let events = h.audit.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "RATE_LIMITED");
        assert_eq!(events[0].severity, Severity::Low);
        assert_eq!(h.audit.calls.lock().unwrap().len(), 1);
    }

    /// A validation failure stops the pass before the hooks are consulted.
    #[test]
    fn test_validation_failure_skips_hooks() {
        let hooks = MockHooks::allowing();
        let seen = hooks.seen.clone();
        let h = harness(MockLimiter { deny: false }, MockValidator { reject: true }, hooks);

        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            panic!("action must not run when validation fails");
        };
        let outcome = h.pipeline.run(&make_request("search_services"), &action);

        assert!(outcome.is_denied());
        assert!(seen.lock().unwrap().is_empty(), "hooks must not see rejected input");
        let events = h.audit.events.lock().unwrap();
        assert_eq!(events[0].event, "VALIDATION_FAILED");
        assert_eq!(events[0].severity, Severity::Medium);
    }

    /// Hooks judge the sanitized parameters, not the raw ones.
    #[test]
    fn test_hooks_see_sanitized_params() {
        let hooks = MockHooks::allowing();
        let seen = hooks.seen.clone();
        let h = harness(MockLimiter { deny: false }, MockValidator { reject: false }, hooks);

        let action = |inv: &ToolInvocation| -> Result<ActionReport, String> {
            assert_eq!(inv.params["sanitized"], json!(true));
            Ok(ActionReport::new(json!({ "ok": true })))
        };
        let outcome = h.pipeline.run(&make_request("search_services"), &action);

        assert!(matches!(outcome, PipelineOutcome::Executed { .. }));
        assert_eq!(seen.lock().unwrap()[0].params["sanitized"], json!(true));
    }

    /// An unauthorized verdict from the hooks is a high-severity denial.
    #[test]
    fn test_unauthorized_is_high_severity() {
        let h = harness(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::returning(|| {
                Err(WardenError::Unauthorized {
                    reason: "content agent may not spend".to_string(),
                })
            }),
        );
        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            panic!("action must not run when unauthorized");
        };

        let outcome = h.pipeline.run(&make_request("create_task"), &action);

        match outcome {
            PipelineOutcome::Denied { decision, .. } => {
                assert!(decision.reason.unwrap().contains("may not spend"));
                assert!(decision.retry_after_ms.is_none());
            }
            other => panic!("expected Denied, got {:?}", other),
        }
        assert_eq!(h.audit.events.lock().unwrap()[0].severity, Severity::High);
    }

    /// A gate that fails internally must deny, never pass through.
    #[test]
    fn test_internal_gate_error_denies() {
        let h = harness(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::returning(|| Err(WardenError::Store { reason: "disk I/O error".to_string() })),
        );
        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            panic!("action must not run when a gate errors");
        };

        let outcome = h.pipeline.run(&make_request("get_balance"), &action);

        assert!(outcome.is_denied());
        assert_eq!(h.audit.events.lock().unwrap()[0].event, "GATE_ERROR");
    }

    /// A successful pass records spend and logs exactly one audit record.
    #[test]
    fn test_successful_run_records_spend() {
        let h = harness(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::allowing(),
        );
        let clock = h.clock.clone();
        let action = move |_: &ToolInvocation| -> Result<ActionReport, String> {
            clock.advance_ms(250);
            Ok(ActionReport::new(json!({ "task": "created" }))
                .with_api_cost(0.02)
                .with_spend(0.01, "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnb"))
        };

        let outcome = h.pipeline.run(&make_request("create_task"), &action);

        match &outcome {
            PipelineOutcome::Executed { output, entry } => {
                assert_eq!(output["task"], "created");
                assert_eq!(entry.outcome, ToolOutcome::Success);
                assert_eq!(entry.duration_ms, 250);
            }
            other => panic!("expected Executed, got {:?}", other),
        }

        assert_eq!(*h.budget.api_calls.lock().unwrap(), vec![0.02]);
        assert_eq!(*h.budget.spends.lock().unwrap(), vec![0.01]);

        let calls = h.audit.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].tx_signature.is_some());
        assert!(h.audit.events.lock().unwrap().is_empty());
    }

    /// An action error is logged as an error outcome and records no spend.
    #[test]
    fn test_action_failure_records_no_spend() {
        let h = harness(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::allowing(),
        );
        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            Err("rpc node unavailable".to_string())
        };

        let outcome = h.pipeline.run(&make_request("create_task"), &action);

        match outcome {
            PipelineOutcome::Failed { error, entry } => {
                assert_eq!(error, "rpc node unavailable");
                assert_eq!(entry.outcome, ToolOutcome::Error);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(h.budget.api_calls.lock().unwrap().is_empty());
        assert_eq!(h.audit.calls.lock().unwrap()[0].error.as_deref(), Some("rpc node unavailable"));
    }

    /// A budget store failure after the action ran does not change the outcome.
    #[test]
    fn test_budget_record_failure_is_not_surfaced() {
        let h = harness_with_budget(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::allowing(),
            MockBudget { fail_records: true, ..MockBudget::default() },
        );
        let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
            Ok(ActionReport::new(json!(null)).with_api_cost(1.0))
        };

        let outcome = h.pipeline.run(&make_request("create_task"), &action);
        assert!(matches!(outcome, PipelineOutcome::Executed { .. }));
    }

    /// `check` logs denials; `record_outcome` logs the host-reported result.
    #[test]
    fn test_check_then_record_outcome() {
        let h = harness(
            MockLimiter { deny: false },
            MockValidator { reject: false },
            MockHooks::allowing(),
        );
        let request = make_request("Bash");

        let decision = h.pipeline.check(&request);
        assert!(decision.allow);
        assert!(h.audit.calls.lock().unwrap().is_empty());

        let entry = h.pipeline.record_outcome(&request, ToolOutcome::Success, 40, None);
        assert_eq!(entry.duration_ms, 40);

        let calls = h.audit.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].client_addr.as_deref(), Some("10.0.0.7"));
        assert!(h.clock.now() > Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }
}
