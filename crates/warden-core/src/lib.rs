//! # warden-core
//!
//! The gate traits and the enforcement pipeline for the Warden guardrail
//! runtime.
//!
//! This crate provides:
//! - The gate traits (`RateLimiter`, `InputValidator`, `BudgetLedger`,
//!   `PolicyHooks`, `AuditSink`) and the untrusted `ToolAction`
//! - The `Clock` abstraction, with a `ManualClock` for deterministic tests
//! - The `Pipeline` that wires the gates together in the correct order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{Pipeline, traits::{RateLimiter, InputValidator, PolicyHooks}};
//! ```

pub mod clock;
pub mod pipeline;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pipeline::{Pipeline, PipelineOutcome};
