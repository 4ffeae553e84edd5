//! Tool requests and the decision value every gate ultimately produces.
//!
//! Gates work in `WardenResult<()>` internally. `PolicyDecision::from_result`
//! is the single place where a gate outcome becomes the caller-facing
//! allow/deny value, so a denial can never be mistaken for a software fault
//! or vice versa.

use serde::{Deserialize, Serialize};

use crate::error::WardenResult;
use crate::role::AgentRole;

/// A named tool call with its raw parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name as the host runtime sees it (e.g. `"Bash"`, `"Write"`,
    /// `"mcp__agentpay__create_task"`).
    pub tool_name: String,
    /// Parameter object. The pipeline never executes anything on it directly.
    pub params: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            params,
        }
    }

    /// The tool name with any `mcp__<server>__` prefix removed.
    pub fn base_name(&self) -> &str {
        strip_external_prefix(&self.tool_name)
    }

    /// Read a string parameter, if present.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Strip an MCP-style `mcp__<server>__` prefix from a tool name.
///
/// Names without the prefix are returned unchanged.
pub fn strip_external_prefix(tool_name: &str) -> &str {
    match tool_name.strip_prefix("mcp__") {
        Some(rest) => match rest.find("__") {
            Some(idx) => &rest[idx + 2..],
            None => tool_name,
        },
        None => tool_name,
    }
}

/// One tool invocation as it enters the pipeline. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub invocation: ToolInvocation,
    /// The role of the agent process making the call.
    pub role: AgentRole,
    /// Rate-limit key: a wallet address, session id, or `"anonymous"`.
    pub client_id: String,
    /// Raw network address, if known. Only ever logged as a hash.
    pub client_addr: Option<String>,
}

impl ToolRequest {
    pub fn new(
        role: AgentRole,
        client_id: impl Into<String>,
        tool_name: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            invocation: ToolInvocation::new(tool_name, params),
            role,
            client_id: client_id.into(),
            client_addr: None,
        }
    }

    /// Attach the caller's network address.
    pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
        self.client_addr = Some(addr.into());
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.invocation.tool_name
    }
}

/// The allow/deny verdict handed back to the host runtime.
///
/// `allow == false` is an unconditional block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    /// Human-readable denial reason. `None` when allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Set only for rate-limit denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
            retry_after_ms: None,
        }
    }

    /// Convert a gate outcome into a decision.
    ///
    /// Every error becomes a denial, including internal ones: a gate that
    /// failed to evaluate has not said yes.
    pub fn from_result<T>(result: &WardenResult<T>) -> Self {
        match result {
            Ok(_) => Self::allow(),
            Err(e) => Self {
                allow: false,
                reason: Some(e.to_string()),
                retry_after_ms: e.retry_after_ms(),
            },
        }
    }

    pub fn is_denied(&self) -> bool {
        !self.allow
    }
}
