//! # warden-audit
//!
//! Audit and security logging for the Warden pipeline.
//!
//! Every pass through the pipeline produces one tool-call record in the
//! day's `audit` file; every denial additionally produces a record in the
//! day's `security` file and an immediate `warn!` on the `warden::security`
//! target. Records are redacted and length-truncated before they are
//! serialized, client ids are shortened and network addresses hashed.
//!
//! Logging never fails the caller. A record that cannot be written is
//! reported through `tracing::error!` and dropped.

pub mod logger;
pub mod memory;
pub mod redaction;
pub mod writer;

pub use logger::{AuditConfig, AuditLogger, DEFAULT_MAX_STRING_LENGTH};
pub use memory::InMemoryLogWriter;
pub use redaction::{actor_prefix, hash_address, redact, scrub, truncate_text, REDACTED};
pub use writer::{JsonlLogWriter, LogWriter};

// ── Tests ─────────────────────────────────────────────────────────────────────
