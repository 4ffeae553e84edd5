//! Reference scenarios.
//!
//! Each scenario assembles a fresh in-memory pipeline on a manual clock,
//! drives it through one enforcement pattern, and reports whether the
//! pipeline behaved as expected.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use warden_contracts::{
    error::{WardenError, WardenResult},
    policy::{ToolInvocation, ToolRequest},
    role::AgentRole,
};
use warden_core::{
    traits::{ActionReport, BudgetLedger},
    ManualClock, PipelineOutcome,
};
use warden_limiter::RateLimitProfile;

use crate::builder::{Warden, WardenBuilder};
use crate::config::WardenConfig;

/// What one scenario observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub lines: Vec<String>,
}

impl ScenarioReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            lines: Vec::new(),
        }
    }

    /// Record an observation; a failed expectation fails the scenario.
    fn expect(&mut self, ok: bool, line: String) {
        self.passed &= ok;
        self.lines
            .push(format!("[{}] {}", if ok { "PASS" } else { "FAIL" }, line));
    }
}

fn scenario_warden(config: WardenConfig) -> WardenResult<(Warden, Arc<ManualClock>)> {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .ok_or_else(|| WardenError::Internal {
            reason: "invalid scenario start time".to_string(),
        })?;
    let clock = Arc::new(ManualClock::new(start));
    let warden = WardenBuilder::in_memory(config)
        .with_clock(clock.clone())
        .build()?;
    Ok((warden, clock))
}

pub fn run_all() -> WardenResult<Vec<ScenarioReport>> {
    Ok(vec![
        scoped_write_denied()?,
        rate_limit_recovers()?,
        root_removal_denied()?,
        budget_ceiling_is_exact()?,
    ])
}

/// A: a marketing specialist tries to write into the chain programs tree.
pub fn scoped_write_denied() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("A: content role writes outside its scope");
    let (warden, _) = scenario_warden(WardenConfig::default())?;

    let request = ToolRequest::new(
        AgentRole::Content,
        "content-agent",
        "Write",
        json!({ "file_path": "/programs/lib", "content": "pub fn drain() {}" }),
    );
    let decision = warden.pipeline().check(&request);
    let reason = decision.reason.clone().unwrap_or_default();

    report.expect(decision.is_denied(), format!("write denied: {}", reason));
    report.expect(
        reason.contains("content"),
        "reason names the content role's scope".to_string(),
    );
    Ok(report)
}

/// B: 21 calls against a 20-token bucket, then one more after a refill.
pub fn rate_limit_recovers() -> WardenResult<ScenarioReport> {
    const TOOL: &str = "deploy_preview";
    const INTERVAL_MS: u64 = 60_000;

    let mut report = ScenarioReport::new("B: rate limit denies the 21st call and recovers");
    let mut config = WardenConfig::default();
    config
        .limits
        .tools
        .insert(TOOL.to_string(), RateLimitProfile::new(20, 1, INTERVAL_MS));
    let (warden, clock) = scenario_warden(config)?;

    let request = ToolRequest::new(AgentRole::Ops, "ops-session", TOOL, json!({}));
    let allowed = (0..20)
        .filter(|_| !warden.pipeline().check(&request).is_denied())
        .count();
    report.expect(allowed == 20, format!("{} of 20 calls allowed", allowed));

    let denied = warden.pipeline().check(&request);
    let retry = denied.retry_after_ms.unwrap_or(0);
    report.expect(
        denied.is_denied() && retry > 0,
        format!("21st call denied, retry after {}ms", retry),
    );

    clock.advance_ms(INTERVAL_MS as i64);
    let after = warden.pipeline().check(&request);
    report.expect(
        !after.is_denied(),
        "call after one full interval allowed".to_string(),
    );
    Ok(report)
}

/// C: recursive root removal is refused for every role.
pub fn root_removal_denied() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("C: rm -rf / denied for every role");
    let (warden, _) = scenario_warden(WardenConfig::default())?;

    for role in AgentRole::ALL {
        let request = ToolRequest::new(
            role,
            format!("{}-agent", role),
            "Bash",
            json!({ "command": "rm -rf /" }),
        );
        let decision = warden.pipeline().check(&request);
        report.expect(
            decision.is_denied(),
            format!(
                "{:<10} {}",
                role.as_str(),
                decision.reason.unwrap_or_else(|| "allowed".to_string())
            ),
        );
    }
    Ok(report)
}

/// D: $9.999 of a $10.00 ceiling still admits one $0.001 call, not two.
pub fn budget_ceiling_is_exact() -> WardenResult<ScenarioReport> {
    let mut report = ScenarioReport::new("D: budget ceiling compares exactly");
    let (warden, _) = scenario_warden(WardenConfig::default())?;
    let role = AgentRole::Ops;

    warden.budget().record_api_call(role, 9.999)?;

    let request = ToolRequest::new(role, "ops-session", "market_quote", json!({ "symbol": "SOL" }));
    let action = |_: &ToolInvocation| -> Result<ActionReport, String> {
        Ok(ActionReport::new(json!({ "price": 142.1 })).with_api_cost(0.001))
    };

    let first = warden.pipeline().run(&request, &action);
    report.expect(
        matches!(first, PipelineOutcome::Executed { .. }),
        "call at $9.999 admitted".to_string(),
    );

    let spent = warden.budget().summary(role)?.record.api_cost_usd();
    report.expect(
        (spent - 10.0).abs() < 1e-9,
        format!("spent ${:.3} of $10.000", spent),
    );

    let second = warden.pipeline().run(&request, &action);
    let reason = match &second {
        PipelineOutcome::Denied { decision, .. } => decision.reason.clone().unwrap_or_default(),
        _ => String::new(),
    };
    report.expect(
        second.is_denied() && reason.contains("budget"),
        format!("call at $10.000 denied: {}", reason),
    );
    Ok(report)
}
