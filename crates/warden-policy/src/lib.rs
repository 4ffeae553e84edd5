//! # warden-policy
//!
//! Role-scoped authorization for agent tool calls.
//!
//! `HookEngine` is the last gate before an action runs. It checks the role's
//! daily budget, then any shell command, then any file write path, then spend
//! authority. Every decision is a table lookup against `PolicyConfig`; no
//! role is special-cased in code.

pub mod command;
pub mod config;
pub mod engine;
pub mod path;

pub use command::CommandPolicy;
pub use config::{default_capabilities, default_profile, PolicyConfig};
pub use engine::HookEngine;
pub use path::{normalize_path, NormalizedPath, PathPolicy};
