//! # warden-contracts
//!
//! Shared types, records, and the unified error type for the Warden
//! guardrail pipeline.
//!
//! Every crate in the workspace imports from here. Apart from currency
//! conversion and tool-name normalization, no behavior lives in this crate:
//! only data definitions and error types.

pub mod audit;
pub mod budget;
pub mod capability;
pub mod error;
pub mod policy;
pub mod role;

#[cfg(test)]
mod tests {
    use super::*;
    use audit::{AuditEntry, LogCategory, Severity, ToolCall, ToolOutcome};
    use budget::{usd_to_micros, BudgetDelta, BudgetLimits, BudgetRecord, MICROS_PER_USD};
    use capability::{CapabilityProfile, CapabilityTable, WriteScope};
    use error::{ValidationKind, WardenError, WardenResult};
    use policy::{strip_external_prefix, PolicyDecision, ToolInvocation};
    use role::{AgentRole, RoleGroup};

    use std::collections::BTreeMap;

    use chrono::{NaiveDate, Utc};

    // ── AgentRole ────────────────────────────────────────────────────────────

    #[test]
    fn role_round_trips_through_its_name() {
        for role in AgentRole::ALL {
            let parsed: AgentRole = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("WEB3".parse::<AgentRole>().unwrap(), AgentRole::Web3);
        assert_eq!(" Ops ".parse::<AgentRole>().unwrap(), AgentRole::Ops);
    }

    #[test]
    fn unknown_role_is_a_config_error() {
        let err = "janitor".parse::<AgentRole>().unwrap_err();
        assert!(matches!(err, WardenError::Config { .. }));
        assert!(err.to_string().contains("janitor"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&AgentRole::Frontend).unwrap();
        assert_eq!(json, "\"frontend\"");
    }

    #[test]
    fn role_groups_and_leads() {
        assert_eq!(AgentRole::Ops.group(), RoleGroup::Leadership);
        assert_eq!(AgentRole::Web3.group(), RoleGroup::Engineering);
        assert_eq!(AgentRole::Social.group(), RoleGroup::Marketing);
        assert_eq!(AgentRole::Proposals.group(), RoleGroup::Sales);

        let leads: Vec<_> = AgentRole::ALL.iter().filter(|r| r.is_lead()).collect();
        assert_eq!(leads.len(), 4);
    }

    // ── CapabilityTable ──────────────────────────────────────────────────────

    #[test]
    fn capability_table_requires_every_role() {
        let mut profiles = BTreeMap::new();
        profiles.insert(AgentRole::Ops, CapabilityProfile::locked());

        let err = CapabilityTable::new(profiles).unwrap_err();
        assert!(matches!(err, WardenError::Config { .. }));
        assert!(err.to_string().contains("dev"));
        assert!(!err.to_string().contains("ops,"));
    }

    #[test]
    fn capability_table_lists_spenders() {
        let mut profiles: BTreeMap<_, _> = AgentRole::ALL
            .iter()
            .map(|r| (*r, CapabilityProfile::locked()))
            .collect();
        profiles.insert(
            AgentRole::Dev,
            CapabilityProfile {
                can_spend: true,
                write_scope: WriteScope::Unrestricted,
                ..CapabilityProfile::locked()
            },
        );

        let table = CapabilityTable::new(profiles).unwrap();
        assert_eq!(table.spenders(), vec![AgentRole::Dev]);
        assert!(table.profile(AgentRole::Content).is_some());
    }

    // ── WardenError ──────────────────────────────────────────────────────────

    #[test]
    fn only_policy_variants_are_denials() {
        let denials = [
            WardenError::RateLimited {
                scope: "global".into(),
                retry_after_ms: 10,
            },
            WardenError::ValidationFailed {
                field: "x".into(),
                reason: "y".into(),
                kind: ValidationKind::Malformed,
            },
            WardenError::BudgetExceeded { reason: "r".into() },
            WardenError::Unauthorized { reason: "r".into() },
        ];
        assert!(denials.iter().all(|e| e.is_denial()));

        let internal = [
            WardenError::Store { reason: "r".into() },
            WardenError::Internal { reason: "r".into() },
            WardenError::LoggingFailure { reason: "r".into() },
            WardenError::Config { reason: "r".into() },
        ];
        assert!(internal.iter().all(|e| !e.is_denial()));
    }

    #[test]
    fn only_rate_limiting_is_retryable() {
        let limited = WardenError::RateLimited {
            scope: "create_task".into(),
            retry_after_ms: 6000,
        };
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after_ms(), Some(6000));

        let unauthorized = WardenError::Unauthorized { reason: "no".into() };
        assert!(!unauthorized.is_retryable());
        assert_eq!(unauthorized.retry_after_ms(), None);
    }

    #[test]
    fn forbidden_patterns_rank_above_malformed_input() {
        let forbidden = WardenError::ValidationFailed {
            field: "description".into(),
            reason: "script tag".into(),
            kind: ValidationKind::ForbiddenPattern,
        };
        let malformed = WardenError::ValidationFailed {
            field: "taskPda".into(),
            reason: "not a public key".into(),
            kind: ValidationKind::Malformed,
        };
        assert!(forbidden.severity() > malformed.severity());
        assert_eq!(
            WardenError::Unauthorized { reason: "x".into() }.severity(),
            Severity::High
        );
    }

    // ── PolicyDecision ───────────────────────────────────────────────────────

    #[test]
    fn decision_from_ok_allows() {
        let ok: WardenResult<()> = Ok(());
        let decision = PolicyDecision::from_result(&ok);
        assert!(decision.allow);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn decision_from_rate_limit_carries_retry_after() {
        let err: WardenResult<()> = Err(WardenError::RateLimited {
            scope: "global".into(),
            retry_after_ms: 1200,
        });
        let decision = PolicyDecision::from_result(&err);
        assert!(decision.is_denied());
        assert_eq!(decision.retry_after_ms, Some(1200));
        assert!(decision.reason.unwrap().contains("global"));
    }

    #[test]
    fn decision_from_internal_error_still_denies() {
        let err: WardenResult<()> = Err(WardenError::Store {
            reason: "disk full".into(),
        });
        let decision = PolicyDecision::from_result(&err);
        assert!(!decision.allow);
        assert!(decision.retry_after_ms.is_none());
    }

    #[test]
    fn allowed_decision_omits_optional_fields_in_json() {
        let json = serde_json::to_value(PolicyDecision::allow()).unwrap();
        assert_eq!(json, serde_json::json!({ "allow": true }));
    }

    // ── Tool names ───────────────────────────────────────────────────────────

    #[test]
    fn external_prefix_is_stripped() {
        assert_eq!(strip_external_prefix("mcp__agentpay__create_task"), "create_task");
        assert_eq!(strip_external_prefix("mcp__other__get_team"), "get_team");
        assert_eq!(strip_external_prefix("Bash"), "Bash");
        // A bare "mcp__" with no server separator is left alone.
        assert_eq!(strip_external_prefix("mcp__weird"), "mcp__weird");

        let inv = ToolInvocation::new("mcp__agentpay__get_task", serde_json::json!({}));
        assert_eq!(inv.base_name(), "get_task");
    }

    // ── Budget ───────────────────────────────────────────────────────────────

    #[test]
    fn usd_conversion_is_exact_at_the_boundary() {
        let spent = usd_to_micros(9.999).unwrap() + usd_to_micros(0.001).unwrap();
        assert_eq!(spent, 10 * MICROS_PER_USD);
    }

    #[test]
    fn negative_or_nan_amounts_are_rejected() {
        assert!(usd_to_micros(-0.01).is_err());
        assert!(usd_to_micros(f64::NAN).is_err());
        assert!(usd_to_micros(f64::INFINITY).is_err());
    }

    #[test]
    fn budget_record_accumulates_deltas() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut record = BudgetRecord::empty(AgentRole::Backend, day);
        record.apply(&BudgetDelta::api_call(250_000));
        record.apply(&BudgetDelta::api_call(250_000));
        record.apply(&BudgetDelta::spend(1_000_000));

        assert_eq!(record.api_cost_micros, 500_000);
        assert_eq!(record.api_calls, 2);
        assert_eq!(record.native_spent_lamports, 1_000_000);
        assert_eq!(record.on_chain_tx_count, 1);
        assert!((record.api_cost_usd() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn budget_limits_from_units() {
        let limits = BudgetLimits::from_units(8.0, 0.3).unwrap();
        assert_eq!(limits.max_api_cost_micros, 8_000_000);
        assert_eq!(limits.max_native_lamports, 300_000_000);
    }

    // ── Audit records ────────────────────────────────────────────────────────

    #[test]
    fn severity_serializes_screaming_snake() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(LogCategory::Security.as_str(), "security");
    }

    #[test]
    fn tool_call_from_entry_copies_the_outcome() {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            role: AgentRole::Dev,
            tool: "Write".into(),
            params: serde_json::json!({ "file_path": "src/lib.rs" }),
            outcome: ToolOutcome::Error,
            duration_ms: 12,
            error: Some("disk full".into()),
        };
        let call = ToolCall::from_entry(&entry);
        assert_eq!(call.tool, "Write");
        assert_eq!(call.role, Some(AgentRole::Dev));
        assert_eq!(call.duration_ms, Some(12));
        assert_eq!(call.error.as_deref(), Some("disk full"));
        assert!(call.client_id.is_none());
    }
}
