//! Built-in policy data: capability profiles, command deny-lists, protected
//! paths and tool classifications.
//!
//! Everything here is plain data. The engine only ever looks things up in it.

use std::collections::BTreeSet;

use warden_contracts::{
    capability::{CapabilityProfile, CapabilityTable, WriteScope},
    role::{AgentRole, RoleGroup},
};

/// Commands denied for every role, including the one with full shell access.
pub const DEFAULT_BLOCKED_COMMANDS: &[&str] = &[
    // Recursive forced removal rooted at / or ~: combined short flags, then
    // separate flags in either order. `-r` and `-R` are both recursive.
    r"\brm\s+(?:-{1,2}[\w-]+\s+)*-\w*(?:[rR]\w*f|f\w*[rR])\w*\s+(?:-{1,2}[\w-]+\s+)*[/~]",
    r"\brm\s+(?:-{1,2}[\w-]+\s+)*(?:-\w*[rR]\w*|--recursive)\s+(?:-{1,2}[\w-]+\s+)*(?:-\w*f\w*|--force)\s+(?:-{1,2}[\w-]+\s+)*[/~]",
    r"\brm\s+(?:-{1,2}[\w-]+\s+)*(?:-\w*f\w*|--force)\s+(?:-{1,2}[\w-]+\s+)*(?:-\w*[rR]\w*|--recursive)\s+(?:-{1,2}[\w-]+\s+)*[/~]",
    // Privilege escalation.
    r"\bsudo\s",
    // Raw device writes and filesystem creation.
    r"\bdd\s+if=",
    r"\bmkfs",
    r">\s*/dev/(sd|hd|vd|xvd|nvme|disk|mmcblk|mem|kmem|port)",
    // Download piped into a shell.
    r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z|da)?sh\b",
    // World-writable permissions.
    r"chmod\s+(-R\s+)?777",
    // Fork bomb.
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
];

/// Commands that look like they touch key material.
pub const DEFAULT_CREDENTIAL_PATTERNS: &[&str] = &[
    r"(?i)\.json.*keypair",
    r"id\.json",
    r"(?i)solana.*config",
    r"(?i)private.*key",
    r"(?i)secret.*key",
    r"(?i)mnemonic",
];

/// Substrings no role may write to.
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &[".env", "secrets.yaml", "keypair", "/keys/"];

/// Writable by every prefix-scoped role.
pub const DEFAULT_SHARED_WRITE_PREFIXES: &[&str] = &["data/contexts/"];

pub const DEFAULT_SHELL_TOOLS: &[&str] = &["Bash"];
pub const DEFAULT_WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];
pub const DEFAULT_SPEND_TOOLS: &[&str] = &["create_task", "submit_result", "submit_result_zk"];
pub const DEFAULT_EXTERNAL_TOOL_PREFIX: &str = "mcp__agentpay__";

/// The built-in profile for one role.
pub fn default_profile(role: AgentRole) -> CapabilityProfile {
    let write_scope = match role {
        AgentRole::Ops | AgentRole::Dev => WriteScope::Unrestricted,
        AgentRole::Frontend => WriteScope::prefixes(["app/"]),
        AgentRole::Web3 => {
            WriteScope::prefixes(["programs/", "circuits/", "tests/", "migrations/"])
        }
        AgentRole::Backend => WriteScope::prefixes([
            "mcp-server/",
            "cli/",
            "security/",
            "agents/skills/",
            "business-agents/shared/",
        ]),
        _ => match role.group() {
            RoleGroup::Marketing => WriteScope::prefixes(["content/", "marketing/"]),
            _ => WriteScope::prefixes(["sales/", "crm/", "proposals/"]),
        },
    };

    let denied_commands = match role {
        AgentRole::Frontend => vec!["anchor", "cargo", "solana", "solana-keygen"],
        AgentRole::Web3 => vec!["next", "npm run dev"],
        _ => vec![],
    };

    CapabilityProfile {
        bash_allowed: matches!(
            role.group(),
            RoleGroup::Leadership | RoleGroup::Engineering
        ),
        credential_access: role == AgentRole::Ops,
        can_spend: matches!(
            role,
            AgentRole::Ops | AgentRole::Dev | AgentRole::Backend | AgentRole::Web3
        ),
        write_scope,
        denied_commands: denied_commands.into_iter().map(String::from).collect(),
    }
}

pub fn default_capabilities() -> CapabilityTable {
    CapabilityTable::from_fn(default_profile)
}

/// Everything the hook engine needs besides the budget ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub capabilities: CapabilityTable,
    pub blocked_commands: Vec<String>,
    pub credential_patterns: Vec<String>,
    pub protected_paths: Vec<String>,
    pub shared_write_prefixes: Vec<String>,
    /// Absolute directory that write prefixes are relative to. Without it,
    /// prefix-scoped roles may only write through relative paths.
    pub workspace_root: Option<String>,
    pub shell_tools: BTreeSet<String>,
    pub write_tools: BTreeSet<String>,
    /// Spend-triggering tools, named without the external prefix.
    pub spend_tools: BTreeSet<String>,
    /// Prefix of the payment server's tools, e.g. `mcp__agentpay__`.
    pub external_tool_prefix: String,
}

fn owned<C>(items: &[&str]) -> C
where
    C: FromIterator<String>,
{
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            capabilities: default_capabilities(),
            blocked_commands: owned(DEFAULT_BLOCKED_COMMANDS),
            credential_patterns: owned(DEFAULT_CREDENTIAL_PATTERNS),
            protected_paths: owned(DEFAULT_PROTECTED_PATHS),
            shared_write_prefixes: owned(DEFAULT_SHARED_WRITE_PREFIXES),
            workspace_root: None,
            shell_tools: owned(DEFAULT_SHELL_TOOLS),
            write_tools: owned(DEFAULT_WRITE_TOOLS),
            spend_tools: owned(DEFAULT_SPEND_TOOLS),
            external_tool_prefix: DEFAULT_EXTERNAL_TOOL_PREFIX.to_string(),
        }
    }
}
