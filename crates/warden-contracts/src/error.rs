//! The unified error type for the Warden pipeline.
//!
//! Every gate returns `WardenResult<T>`. The first four variants are policy
//! denials a caller can see; the rest are internal conditions which the
//! pipeline still converts into a denial so that no gate failure ever lets an
//! action through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::Severity;

/// Why an input failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// Matched the deny-list of unsafe patterns. Security relevant.
    ForbiddenPattern,
    /// Wrong shape: bad address, out of range, not in the enum, too long.
    Malformed,
}

#[derive(Debug, Error)]
pub enum WardenError {
    /// A token bucket is empty. Retry after `retry_after_ms`.
    #[error("rate limit exceeded for {scope}; retry in {retry_after_ms}ms")]
    RateLimited { scope: String, retry_after_ms: u64 },

    /// An input field is unsafe or malformed. Not retryable without a change.
    #[error("invalid input '{field}': {reason}")]
    ValidationFailed {
        field: String,
        reason: String,
        kind: ValidationKind,
    },

    /// Today's spend in one of the two currencies reached its ceiling.
    #[error("budget exceeded: {reason}")]
    BudgetExceeded { reason: String },

    /// The role categorically lacks the capability.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A log record could not be persisted. Never surfaced to callers.
    #[error("log write failed: {reason}")]
    LoggingFailure { reason: String },

    /// The durable budget store failed.
    #[error("budget store error: {reason}")]
    Store { reason: String },

    /// A gate hit an unexpected internal condition (e.g. a poisoned lock).
    #[error("internal error: {reason}")]
    Internal { reason: String },

    /// Configuration is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the Warden crates.
pub type WardenResult<T> = Result<T, WardenError>;

impl WardenError {
    /// True for the caller-visible policy outcomes.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            WardenError::RateLimited { .. }
                | WardenError::ValidationFailed { .. }
                | WardenError::BudgetExceeded { .. }
                | WardenError::Unauthorized { .. }
        )
    }

    /// Only rate limiting clears by itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WardenError::RateLimited { .. })
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            WardenError::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Severity used when this error is recorded as a security event.
    pub fn severity(&self) -> Severity {
        match self {
            WardenError::RateLimited { .. } => Severity::Low,
            WardenError::ValidationFailed {
                kind: ValidationKind::ForbiddenPattern,
                ..
            } => Severity::Medium,
            WardenError::ValidationFailed { .. } => Severity::Low,
            WardenError::BudgetExceeded { .. } => Severity::Medium,
            WardenError::Unauthorized { .. } => Severity::High,
            WardenError::Store { .. } | WardenError::Internal { .. } => Severity::High,
            WardenError::LoggingFailure { .. } | WardenError::Config { .. } => Severity::Medium,
        }
    }

    /// Event name written to the security log.
    pub fn event_name(&self) -> &'static str {
        match self {
            WardenError::RateLimited { .. } => "RATE_LIMITED",
            WardenError::ValidationFailed { .. } => "VALIDATION_FAILED",
            WardenError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            WardenError::Unauthorized { .. } => "UNAUTHORIZED",
            WardenError::LoggingFailure { .. } => "LOGGING_FAILURE",
            WardenError::Store { .. } | WardenError::Internal { .. } | WardenError::Config { .. } => {
                "GATE_ERROR"
            }
        }
    }
}
