//! The audit logger: turns sink inputs into scrubbed, persisted records.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use warden_contracts::{
    audit::{
        GeneralRecord, LogCategory, LogLevel, SecurityEventRecord, SecurityNotice, Severity,
        ToolCall, ToolCallRecord,
    },
    error::WardenResult,
    role::AgentRole,
};
use warden_core::{traits::AuditSink, Clock};

use crate::redaction::{actor_prefix, hash_address, scrub, truncate_text};
use crate::writer::LogWriter;

pub const DEFAULT_MAX_STRING_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// When false, nothing is written and nothing is echoed.
    pub enabled: bool,
    /// Echo every tool call and general record through `tracing`. Security
    /// events are always echoed.
    pub console_output: bool,
    pub max_string_length: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console_output: false,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

pub struct AuditLogger {
    writer: Arc<dyn LogWriter>,
    config: AuditConfig,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    pub fn new(
        writer: Arc<dyn LogWriter>,
        config: AuditConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            writer,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Read back one day's records of one category.
    pub fn read_day(&self, category: LogCategory, date: NaiveDate) -> WardenResult<Vec<Value>> {
        self.writer.read_entries(category, date)
    }

    // ── Record construction ──────────────────────────────────────────────────

    pub fn tool_call_record(&self, call: &ToolCall) -> ToolCallRecord {
        ToolCallRecord {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            level: if call.error.is_some() {
                LogLevel::Error
            } else {
                LogLevel::Info
            },
            tool: call.tool.clone(),
            role: call.role,
            actor: actor(call.client_id.as_deref(), call.role),
            params: scrub(&call.params, self.config.max_string_length),
            success: call.error.is_none(),
            error: call
                .error
                .as_deref()
                .map(|e| truncate_text(e, self.config.max_string_length)),
            duration_ms: call.duration_ms,
            tx_signature: call.tx_signature.clone(),
            ip_hash: call.client_addr.as_deref().map(hash_address),
        }
    }

    pub fn security_record(&self, notice: &SecurityNotice) -> SecurityEventRecord {
        SecurityEventRecord {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            level: LogLevel::Security,
            event: notice.event.clone(),
            severity: notice.severity,
            role: notice.role,
            actor: actor(notice.client_id.as_deref(), notice.role),
            details: scrub(&notice.details, self.config.max_string_length),
            ip_hash: notice.client_addr.as_deref().map(hash_address),
        }
    }

    fn persist<T: Serialize>(&self, category: LogCategory, record: &T) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                error!(category = category.as_str(), error = %e, "failed to serialize log record");
                return;
            }
        };
        if let Err(e) = self.writer.append(category, self.clock.today(), &line) {
            error!(category = category.as_str(), error = %e, "failed to write log record");
        }
    }

    // ── Security helpers ─────────────────────────────────────────────────────

    pub fn log_rate_limit(
        &self,
        client_id: &str,
        tool: &str,
        retry_after_ms: u64,
        client_addr: Option<&str>,
    ) {
        self.log_security_event(
            SecurityNotice::new(
                "RATE_LIMITED",
                Severity::Low,
                json!({ "tool": tool, "retry_after_ms": retry_after_ms }),
            )
            .with_client(client_id, client_addr.map(str::to_string)),
        );
    }

    pub fn log_validation_failure(
        &self,
        client_id: &str,
        tool: &str,
        field: &str,
        reason: &str,
        client_addr: Option<&str>,
    ) {
        self.log_security_event(
            SecurityNotice::new(
                "VALIDATION_FAILED",
                Severity::Medium,
                json!({ "tool": tool, "field": field, "reason": reason }),
            )
            .with_client(client_id, client_addr.map(str::to_string)),
        );
    }

    pub fn log_auth_failure(&self, client_id: &str, reason: &str, client_addr: Option<&str>) {
        self.log_security_event(
            SecurityNotice::new("AUTH_FAILED", Severity::High, json!({ "reason": reason }))
                .with_client(client_id, client_addr.map(str::to_string)),
        );
    }

    /// `details` must be an object; its fields are merged next to `activity`.
    pub fn log_suspicious_activity(
        &self,
        client_id: &str,
        activity: &str,
        details: Value,
        client_addr: Option<&str>,
    ) {
        let mut merged = json!({ "activity": activity });
        if let (Some(target), Value::Object(extra)) = (merged.as_object_mut(), details) {
            target.extend(extra);
        }
        self.log_security_event(
            SecurityNotice::new("SUSPICIOUS_ACTIVITY", Severity::High, merged)
                .with_client(client_id, client_addr.map(str::to_string)),
        );
    }

    pub fn log_budget_exceeded(&self, role: AgentRole, reason: &str) {
        self.log_security_event(
            SecurityNotice::new("BUDGET_EXCEEDED", Severity::Medium, json!({ "reason": reason }))
                .with_role(role),
        );
    }

    // ── General records ──────────────────────────────────────────────────────

    pub fn log(&self, level: LogLevel, message: &str, data: Value) {
        if !self.config.enabled {
            return;
        }
        let record = GeneralRecord {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            level,
            message: message.to_string(),
            data: scrub(&data, self.config.max_string_length),
        };
        if self.config.console_output || matches!(level, LogLevel::Error | LogLevel::Security) {
            info!(target: "warden::general", level = ?level, "{}", message);
        }
        self.persist(LogCategory::General, &record);
    }

    pub fn debug(&self, message: &str, data: Value) {
        self.log(LogLevel::Debug, message, data);
    }

    pub fn info(&self, message: &str, data: Value) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: &str, data: Value) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: &str, data: Value) {
        self.log(LogLevel::Error, message, data);
    }
}

impl AuditSink for AuditLogger {
    fn log_tool_call(&self, call: ToolCall) {
        if !self.config.enabled {
            return;
        }
        let record = self.tool_call_record(&call);
        if self.config.console_output {
            info!(
                target: "warden::audit",
                tool = %record.tool,
                actor = record.actor.as_deref().unwrap_or("anon"),
                success = record.success,
                duration_ms = record.duration_ms,
                "tool call"
            );
        }
        self.persist(LogCategory::Audit, &record);
    }

    fn log_security_event(&self, notice: SecurityNotice) {
        if !self.config.enabled {
            return;
        }
        let record = self.security_record(&notice);
        warn!(
            target: "warden::security",
            severity = %record.severity,
            event = %record.event,
            actor = record.actor.as_deref().unwrap_or("anon"),
            "security event"
        );
        self.persist(LogCategory::Security, &record);
    }
}

/// Shortened client id, or the role when there is no client id.
fn actor(client_id: Option<&str>, role: Option<AgentRole>) -> Option<String> {
    match (client_id, role) {
        (Some(id), _) => Some(actor_prefix(id)),
        (None, Some(role)) => Some(role.as_str().to_string()),
        (None, None) => None,
    }
}
