//! The one configuration surface: a TOML document plus a few environment
//! overrides.
//!
//! Every section is optional. Whatever a section leaves out keeps its
//! built-in default, so an empty document yields the stock pipeline.
//!
//! ```toml
//! state_dir = "/var/lib/warden"
//!
//! [limits.tools.create_task]
//! capacity = 5
//! refill_rate = 1
//! refill_interval_ms = 12000
//!
//! [budget.roles.content]
//! max_budget_usd = 2.5
//!
//! [capabilities.content]
//! write_prefixes = ["content/", "blog/"]
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use warden_audit::AuditConfig;
use warden_budget::BudgetConfig;
use warden_contracts::{
    budget::{native_to_lamports, usd_to_micros},
    capability::{CapabilityProfile, WriteScope},
    error::{WardenError, WardenResult},
    role::AgentRole,
};
use warden_limiter::{LimiterConfig, RateLimitProfile};
use warden_policy::PolicyConfig;
use warden_validate::ValidatorConfig;

pub const CONFIG_ENV: &str = "WARDEN_CONFIG";
pub const STATE_DIR_ENV: &str = "WARDEN_STATE_DIR";
pub const LOG_DIR_ENV: &str = "WARDEN_LOG_DIR";
pub const WORKSPACE_ROOT_ENV: &str = "WARDEN_WORKSPACE_ROOT";

pub const DEFAULT_STATE_DIR: &str = "./data";
pub const BUDGET_DB_FILE: &str = "budgets.sqlite3";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    pub state_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub limits: LimitsSection,
    pub budget: BudgetSection,
    /// Keyed by role name.
    pub capabilities: BTreeMap<String, CapabilitySection>,
    pub policy: PolicySection,
    pub validation: ValidationSection,
    pub audit: AuditSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub global: Option<RateLimitProfile>,
    pub default: Option<RateLimitProfile>,
    pub tools: HashMap<String, RateLimitProfile>,
    pub sweep_interval_ms: Option<u64>,
    pub idle_horizon_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetSection {
    pub retention_days: Option<u32>,
    pub roles: BTreeMap<String, RoleBudgetSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleBudgetSection {
    pub max_budget_usd: Option<f64>,
    pub max_native_per_day: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilitySection {
    pub bash_allowed: Option<bool>,
    pub credential_access: Option<bool>,
    pub can_spend: Option<bool>,
    /// `true` lifts the prefix whitelist entirely; `write_prefixes` is then
    /// ignored.
    pub unrestricted_writes: Option<bool>,
    pub write_prefixes: Option<Vec<String>>,
    pub denied_commands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySection {
    pub protected_paths: Option<Vec<String>>,
    pub blocked_commands: Option<Vec<String>>,
    pub credential_patterns: Option<Vec<String>>,
    pub shell_tools: Option<Vec<String>>,
    pub write_tools: Option<Vec<String>>,
    pub spend_tools: Option<Vec<String>>,
    pub external_tool_prefix: Option<String>,
    pub shared_write_prefixes: Option<Vec<String>>,
    /// Absolute directory the role write prefixes are anchored to.
    pub workspace_root: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    pub forbidden_patterns: Option<Vec<String>>,
    pub default_max_length: Option<usize>,
    pub passthrough_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    pub enabled: Option<bool>,
    pub console_output: Option<bool>,
    pub max_string_length: Option<usize>,
}

fn config_error(reason: impl Into<String>) -> WardenError {
    WardenError::Config {
        reason: reason.into(),
    }
}

impl WardenConfig {
    /// Parse `s` as a TOML configuration document.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s).map_err(|e| config_error(format!("failed to parse config TOML: {}", e)))
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from the process environment.
    pub fn from_env() -> WardenResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment: the file named by
    /// `WARDEN_CONFIG` (if any), then the directory overrides.
    pub fn from_lookup<F>(lookup: F) -> WardenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = lookup(STATE_DIR_ENV) {
            config.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(LOG_DIR_ENV) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(root) = lookup(WORKSPACE_ROOT_ENV) {
            config.policy.workspace_root = Some(root);
        }
        Ok(config)
    }

    // ── Paths ────────────────────────────────────────────────────────────────

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.state_dir().join("audit"))
    }

    pub fn budget_db_path(&self) -> PathBuf {
        self.state_dir().join(BUDGET_DB_FILE)
    }

    // ── Per-crate configuration ──────────────────────────────────────────────

    pub fn limiter_config(&self) -> WardenResult<LimiterConfig> {
        let section = &self.limits;
        let mut config = LimiterConfig::default();
        if let Some(global) = section.global {
            config.global = global;
        }
        if let Some(default) = section.default {
            config.default = default;
        }
        config
            .tools
            .extend(section.tools.iter().map(|(name, p)| (name.clone(), *p)));
        if let Some(ms) = section.sweep_interval_ms {
            config.sweep_interval_ms = ms;
        }
        if let Some(ms) = section.idle_horizon_ms {
            config.idle_horizon_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn budget_config(&self) -> WardenResult<BudgetConfig> {
        let mut config = BudgetConfig::default();
        if let Some(days) = self.budget.retention_days {
            config.retention_days = days;
        }
        for (name, section) in &self.budget.roles {
            let role: AgentRole = name.parse()?;
            let mut updated = config.limits_for(role)?;
            if let Some(usd) = section.max_budget_usd {
                updated.max_api_cost_micros = usd_to_micros(usd).map_err(|e| {
                    config_error(format!("budget.roles.{}.max_budget_usd: {}", name, e))
                })?;
            }
            if let Some(native) = section.max_native_per_day {
                updated.max_native_lamports = native_to_lamports(native).map_err(|e| {
                    config_error(format!("budget.roles.{}.max_native_per_day: {}", name, e))
                })?;
            }
            config.limits.insert(role, updated);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn policy_config(&self) -> WardenResult<PolicyConfig> {
        let mut config = PolicyConfig::default();

        for (name, section) in &self.capabilities {
            let role: AgentRole = name.parse()?;
            let base = config
                .capabilities
                .profile(role)
                .cloned()
                .unwrap_or_else(CapabilityProfile::locked);
            config
                .capabilities
                .set_profile(role, section.apply_to(base));
        }

        let p = &self.policy;
        overlay(&mut config.protected_paths, &p.protected_paths);
        overlay(&mut config.blocked_commands, &p.blocked_commands);
        overlay(&mut config.credential_patterns, &p.credential_patterns);
        overlay(&mut config.shared_write_prefixes, &p.shared_write_prefixes);
        overlay_set(&mut config.shell_tools, &p.shell_tools);
        overlay_set(&mut config.write_tools, &p.write_tools);
        overlay_set(&mut config.spend_tools, &p.spend_tools);
        if let Some(prefix) = &p.external_tool_prefix {
            config.external_tool_prefix = prefix.clone();
        }
        if let Some(root) = &p.workspace_root {
            config.workspace_root = Some(root.clone());
        }
        Ok(config)
    }

    pub fn validator_config(&self) -> WardenResult<ValidatorConfig> {
        let mut config = ValidatorConfig::default();
        let v = &self.validation;
        overlay(&mut config.forbidden_patterns, &v.forbidden_patterns);
        overlay_set(&mut config.passthrough_tools, &v.passthrough_tools);
        if let Some(len) = v.default_max_length {
            config.default_max_length = len;
        }
        Ok(config)
    }

    pub fn audit_config(&self) -> WardenResult<AuditConfig> {
        let mut config = AuditConfig::default();
        let a = &self.audit;
        if let Some(enabled) = a.enabled {
            config.enabled = enabled;
        }
        if let Some(console) = a.console_output {
            config.console_output = console;
        }
        if let Some(len) = a.max_string_length {
            if len == 0 {
                return Err(config_error("audit.max_string_length must be non-zero"));
            }
            config.max_string_length = len;
        }
        Ok(config)
    }
}

impl CapabilitySection {
    fn apply_to(&self, mut profile: CapabilityProfile) -> CapabilityProfile {
        if let Some(v) = self.bash_allowed {
            profile.bash_allowed = v;
        }
        if let Some(v) = self.credential_access {
            profile.credential_access = v;
        }
        if let Some(v) = self.can_spend {
            profile.can_spend = v;
        }
        if let Some(prefixes) = &self.write_prefixes {
            profile.write_scope = WriteScope::prefixes(prefixes.iter().cloned());
        }
        if self.unrestricted_writes == Some(true) {
            profile.write_scope = WriteScope::Unrestricted;
        }
        if let Some(words) = &self.denied_commands {
            profile.denied_commands = words.clone();
        }
        profile
    }
}

fn overlay(target: &mut Vec<String>, value: &Option<Vec<String>>) {
    if let Some(items) = value {
        *target = items.clone();
    }
}

fn overlay_set(target: &mut BTreeSet<String>, value: &Option<Vec<String>>) {
    if let Some(items) = value {
        *target = items.iter().cloned().collect();
    }
}
