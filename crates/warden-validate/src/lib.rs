//! # warden-validate
//!
//! Input validation and sanitization for the Warden pipeline.
//!
//! Known tools get an explicit field allow-list with structural checks
//! (public-key format, numeric range, enum membership, length). Unknown tools
//! fall back to a recursive string sanitizer. Every string is checked
//! against a deny-list of injection patterns before anything else happens.

pub mod patterns;
pub mod rules;
pub mod validator;

pub use patterns::{PatternSet, DEFAULT_FORBIDDEN_PATTERNS};
pub use validator::{
    clean_text, ToolInputValidator, ValidatorConfig, DEFAULT_PASSTHROUGH_TOOLS,
    PROMPT_DATA_END, PROMPT_DATA_START,
};
