//! # warden-runtime
//!
//! Reference runtime for the Warden guardrail pipeline: one TOML and
//! environment configuration surface (`WardenConfig`), a builder that
//! assembles every gate into a `Pipeline` (`WardenBuilder`), and the
//! reference scenarios.
//!
//! ```rust,ignore
//! use warden_runtime::{WardenBuilder, WardenConfig};
//!
//! let warden = WardenBuilder::new(WardenConfig::from_env()?).build()?;
//! let decision = warden.pipeline().check(&request);
//! ```

pub mod builder;
pub mod config;
pub mod scenarios;

pub use builder::{Warden, WardenBuilder};
pub use config::WardenConfig;
pub use scenarios::ScenarioReport;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use warden_audit::InMemoryLogWriter;
    use warden_contracts::{
        audit::LogCategory,
        budget::MICROS_PER_USD,
        capability::WriteScope,
        error::WardenError,
        policy::{ToolInvocation, ToolRequest},
        role::AgentRole,
    };
    use warden_core::{traits::ActionReport, ManualClock, PipelineOutcome};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()))
    }

    fn build_error(config: WardenConfig) -> WardenError {
        match WardenBuilder::in_memory(config).build() {
            Ok(_) => panic!("expected the build to fail"),
            Err(e) => e,
        }
    }

    fn echo(_: &ToolInvocation) -> Result<ActionReport, String> {
        Ok(ActionReport::new(json!({ "ok": true })))
    }

    // ── Configuration ────────────────────────────────────────────────────────

    #[test]
    fn empty_document_yields_defaults() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.state_dir(), PathBuf::from("./data"));
        assert_eq!(config.log_dir(), PathBuf::from("./data").join("audit"));
        assert_eq!(
            config.budget_db_path(),
            PathBuf::from("./data").join("budgets.sqlite3")
        );
    }

    #[test]
    fn sections_overlay_the_defaults() {
        let config = WardenConfig::from_toml_str(
            r#"
            state_dir = "/var/lib/warden"

            [limits.tools.create_task]
            capacity = 5
            refill_rate = 1
            refill_interval_ms = 12000

            [budget]
            retention_days = 7

            [budget.roles.content]
            max_budget_usd = 2.5

            [capabilities.content]
            write_prefixes = ["blog/"]

            [capabilities.research]
            unrestricted_writes = true

            [policy]
            external_tool_prefix = "mcp__pay__"
            workspace_root = "/home/agent/repo"

            [audit]
            console_output = true
            "#,
        )
        .unwrap();

        assert_eq!(config.log_dir(), PathBuf::from("/var/lib/warden/audit"));

        let limiter = config.limiter_config().unwrap();
        assert_eq!(limiter.profile_for("create_task").capacity, 5);
        // Untouched tools keep their built-in profile.
        assert_eq!(limiter.profile_for("dispute_task").capacity, 5);
        assert_eq!(limiter.profile_for("get_task").capacity, 120);

        let budget = config.budget_config().unwrap();
        assert_eq!(budget.retention_days, 7);
        let content = budget.limits_for(AgentRole::Content).unwrap();
        assert_eq!(content.max_api_cost_micros, 5 * MICROS_PER_USD / 2);
        assert_eq!(content.max_native_lamports, 50_000_000);

        let policy = config.policy_config().unwrap();
        let content = policy.capabilities.profile(AgentRole::Content).unwrap();
        assert_eq!(content.write_scope, WriteScope::prefixes(["blog/"]));
        assert!(!content.bash_allowed);
        assert_eq!(
            policy.capabilities.profile(AgentRole::Research).unwrap().write_scope,
            WriteScope::Unrestricted
        );
        assert_eq!(policy.external_tool_prefix, "mcp__pay__");
        assert_eq!(policy.workspace_root.as_deref(), Some("/home/agent/repo"));

        assert!(config.audit_config().unwrap().console_output);
    }

    #[test]
    fn unknown_keys_and_roles_are_config_errors() {
        let err = WardenConfig::from_toml_str("[audit]\nverbose = true").unwrap_err();
        assert!(matches!(err, WardenError::Config { .. }));

        let config = WardenConfig::from_toml_str("[capabilities.intern]\nbash_allowed = true").unwrap();
        assert!(matches!(config.policy_config(), Err(WardenError::Config { .. })));

        let config = WardenConfig::from_toml_str("[budget.roles.ops]\nmax_budget_usd = -1.0").unwrap();
        assert!(matches!(config.budget_config(), Err(WardenError::Config { .. })));
    }

    #[test]
    fn invalid_settings_fail_at_build_time() {
        let mut zero_capacity = WardenConfig::default();
        zero_capacity.limits.tools = HashMap::from([(
            "get_task".to_string(),
            warden_limiter::RateLimitProfile::new(0, 1, 1000),
        )]);
        assert!(matches!(build_error(zero_capacity), WardenError::Config { .. }));

        let bad_regex = WardenConfig::from_toml_str("[policy]\nblocked_commands = [\"(\"]").unwrap();
        assert!(matches!(build_error(bad_regex), WardenError::Config { .. }));

        let zero_len = WardenConfig::from_toml_str("[validation]\ndefault_max_length = 0").unwrap();
        assert!(matches!(build_error(zero_len), WardenError::Config { .. }));

        let relative_root = WardenConfig::from_toml_str("[policy]\nworkspace_root = \"repo\"").unwrap();
        assert!(matches!(build_error(relative_root), WardenError::Config { .. }));
    }

    #[test]
    fn environment_names_the_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "[audit]\nenabled = false\n").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let env = HashMap::from([
            ("WARDEN_CONFIG", path_str),
            ("WARDEN_STATE_DIR", "/srv/warden".to_string()),
            ("WARDEN_WORKSPACE_ROOT", "/srv/repo".to_string()),
        ]);
        let config = WardenConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        assert!(!config.audit_config().unwrap().enabled);
        assert_eq!(config.state_dir(), PathBuf::from("/srv/warden"));
        assert_eq!(config.log_dir(), PathBuf::from("/srv/warden/audit"));
        assert_eq!(config.policy_config().unwrap().workspace_root.as_deref(), Some("/srv/repo"));

        let missing = WardenConfig::from_lookup(|key| {
            (key == "WARDEN_CONFIG").then(|| "/nonexistent/warden.toml".to_string())
        });
        assert!(matches!(missing, Err(WardenError::Config { .. })));
    }

    // ── Assembly ─────────────────────────────────────────────────────────────

    #[test]
    fn denied_pass_is_logged_to_audit_and_security() {
        let writer = Arc::new(InMemoryLogWriter::new());
        let warden = WardenBuilder::in_memory(WardenConfig::default())
            .with_log_writer(writer.clone())
            .with_clock(clock())
            .build()
            .unwrap();

        let request = ToolRequest::new(
            AgentRole::Sales,
            "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
            "mcp__agentpay__create_task",
            json!({
                "servicePda": "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
                "description": "pitch deck review"
            }),
        )
        .with_client_addr("198.51.100.23");
        let outcome = warden.pipeline().run(&request, &echo);
        assert!(outcome.is_denied());

        let audit = writer.entries(LogCategory::Audit);
        let security = writer.entries(LogCategory::Security);
        assert_eq!(audit.len(), 1);
        assert_eq!(security.len(), 1);
        assert_eq!(security[0]["event"], "UNAUTHORIZED");
        assert_eq!(security[0]["actor"], "9WzDXwBb...");
        assert!(!security[0].to_string().contains("198.51.100.23"));
    }

    #[test]
    fn on_disk_storage_lives_under_the_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = WardenConfig {
            state_dir: Some(dir.path().to_path_buf()),
            ..WardenConfig::default()
        };
        let warden = WardenBuilder::new(config).with_clock(clock()).build().unwrap();

        let request = ToolRequest::new(AgentRole::Dev, "dev-session", "summarize", json!({ "text": "hi" }));
        let outcome = warden.pipeline().run(&request, &echo);
        assert!(matches!(outcome, PipelineOutcome::Executed { .. }));

        assert!(dir.path().join("budgets.sqlite3").exists());
        assert!(dir.path().join("audit").join("audit-2026-03-01.jsonl").exists());
    }

    // ── Scenarios ────────────────────────────────────────────────────────────

    #[test]
    fn reference_scenarios_pass() {
        let reports = scenarios::run_all().unwrap();
        assert_eq!(reports.len(), 4);
        for report in reports {
            assert!(report.passed, "{}: {:#?}", report.name, report.lines);
        }
    }
}
