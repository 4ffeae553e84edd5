//! Audit and security log record types.
//!
//! Two kinds of shapes live here: the inputs the pipeline hands to the audit
//! sink (`ToolCall`, `SecurityNotice`), which may still carry raw client
//! identifiers, and the persisted records (`ToolCallRecord`,
//! `SecurityEventRecord`, `GeneralRecord`), which never do.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::AgentRole;

/// Security event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Level stamped on every persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Security,
}

/// Which daily file a record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Audit,
    Security,
    General,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Audit => "audit",
            LogCategory::Security => "security",
            LogCategory::General => "general",
        }
    }
}

/// How a gated tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Success,
    Error,
    Denied,
}

/// The structured record produced by the post-tool-use hook.
///
/// Pure documentation of what already happened; producing one has no side
/// effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub role: AgentRole,
    pub tool: String,
    pub params: serde_json::Value,
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Sink inputs ───────────────────────────────────────────────────────────────

/// One tool invocation, as handed to the audit sink.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub tool: String,
    pub role: Option<AgentRole>,
    pub client_id: Option<String>,
    pub client_addr: Option<String>,
    pub params: serde_json::Value,
    /// Error message when the call failed or was denied.
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    /// On-chain transaction reference, if the action produced one.
    pub tx_signature: Option<String>,
}

impl ToolCall {
    /// Derive a sink input from a post-tool-use entry.
    pub fn from_entry(entry: &AuditEntry) -> Self {
        Self {
            tool: entry.tool.clone(),
            role: Some(entry.role),
            params: entry.params.clone(),
            error: entry.error.clone(),
            duration_ms: Some(entry.duration_ms),
            ..Self::default()
        }
    }
}

/// A denied or suspicious action, as handed to the audit sink.
#[derive(Debug, Clone)]
pub struct SecurityNotice {
    /// Event name, e.g. `"RATE_LIMITED"` or `"UNAUTHORIZED"`.
    pub event: String,
    pub severity: Severity,
    pub role: Option<AgentRole>,
    pub client_id: Option<String>,
    pub client_addr: Option<String>,
    pub details: serde_json::Value,
}

impl SecurityNotice {
    pub fn new(event: impl Into<String>, severity: Severity, details: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            severity,
            role: None,
            client_id: None,
            client_addr: None,
            details,
        }
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>, addr: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_addr = addr;
        self
    }
}

// ── Persisted records ─────────────────────────────────────────────────────────

/// One line of the daily `audit` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
    /// Short client-id prefix, never the full identifier.
    pub actor: Option<String>,
    /// Redacted and length-truncated parameters.
    pub params: serde_json::Value,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub tx_signature: Option<String>,
    pub ip_hash: Option<String>,
}

/// One line of the daily `security` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub event: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
    pub actor: Option<String>,
    pub details: serde_json::Value,
    pub ip_hash: Option<String>,
}

/// One line of the daily `general` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub data: serde_json::Value,
}
