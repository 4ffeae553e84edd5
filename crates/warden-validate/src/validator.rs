//! The input validator: structural rules for known tools, a generic
//! sanitizer for everything else.

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use warden_contracts::{
    error::{ValidationKind, WardenError, WardenResult},
    policy::strip_external_prefix,
};
use warden_core::traits::InputValidator;

use crate::patterns::{compile_pattern, PatternSet, DEFAULT_FORBIDDEN_PATTERNS, PUBLIC_KEY_PATTERN};
use crate::rules::{tool_rules, FieldKind, FieldRule, MAX_DEFAULT, MAX_DESCRIPTION};

pub const PROMPT_DATA_START: &str = "[USER_DATA_START]";
pub const PROMPT_DATA_END: &str = "[USER_DATA_END]";

/// Host tools whose parameters are judged by the policy hooks instead.
///
/// Shell commands and file contents must reach the command and path checks
/// byte for byte; stripping angle brackets would hide a redirect.
pub const DEFAULT_PASSTHROUGH_TOOLS: &[&str] = &["Bash", "Write", "Edit", "MultiEdit"];

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    pub forbidden_patterns: Vec<String>,
    /// Truncation cap for strings of tools without field rules.
    pub default_max_length: usize,
    pub passthrough_tools: BTreeSet<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            forbidden_patterns: DEFAULT_FORBIDDEN_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            default_max_length: MAX_DEFAULT,
            passthrough_tools: DEFAULT_PASSTHROUGH_TOOLS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

pub struct ToolInputValidator {
    forbidden: PatternSet,
    public_key: Regex,
    default_max_length: usize,
    passthrough_tools: BTreeSet<String>,
}

impl ToolInputValidator {
    pub fn new(config: ValidatorConfig) -> WardenResult<Self> {
        if config.default_max_length == 0 {
            return Err(WardenError::Config {
                reason: "validation default_max_length must be non-zero".to_string(),
            });
        }
        Ok(Self {
            forbidden: PatternSet::compile(&config.forbidden_patterns)?,
            public_key: compile_pattern(PUBLIC_KEY_PATTERN)?,
            default_max_length: config.default_max_length,
            passthrough_tools: config.passthrough_tools,
        })
    }

    /// True when `input` has the surface format of a ledger public key.
    pub fn is_valid_public_key(&self, input: &str) -> bool {
        self.public_key.is_match(input)
    }

    /// Wrap untrusted text in data delimiters before it is echoed into a
    /// downstream prompt.
    pub fn escape_for_prompt(&self, text: &str) -> WardenResult<String> {
        self.reject_forbidden("prompt_data", text)?;
        let clean = clean_text(&truncate_chars(text, MAX_DESCRIPTION));
        Ok(format!("{}{}{}", PROMPT_DATA_START, clean, PROMPT_DATA_END))
    }

    fn reject_forbidden(&self, field: &str, text: &str) -> WardenResult<()> {
        if let Some(pattern) = self.forbidden.first_match(text) {
            debug!(field = %field, pattern = %pattern.as_str(), "forbidden pattern matched");
            return Err(WardenError::ValidationFailed {
                field: field.to_string(),
                reason: "contains a forbidden pattern".to_string(),
                kind: ValidationKind::ForbiddenPattern,
            });
        }
        Ok(())
    }

    fn validate_known(&self, rules: &[FieldRule], params: &Value) -> WardenResult<Value> {
        let mut validated = Map::new();
        for rule in rules {
            let raw = params.get(rule.name).filter(|v| !v.is_null());
            let Some(raw) = raw else {
                if rule.required {
                    return Err(malformed(rule.name, "is required"));
                }
                continue;
            };
            let value = self.validate_field(rule, raw)?;
            validated.insert(rule.name.to_string(), value);
        }
        Ok(Value::Object(validated))
    }

    fn validate_field(&self, rule: &FieldRule, raw: &Value) -> WardenResult<Value> {
        let field = rule.name;
        match rule.kind {
            FieldKind::Text { max_len } => {
                let text = scalar_text(field, raw)?;
                self.reject_forbidden(field, &text)?;
                if text.chars().count() > max_len {
                    return Err(malformed(
                        field,
                        &format!("exceeds {} characters", max_len),
                    ));
                }
                Ok(Value::String(clean_text(&text)))
            }
            FieldKind::PublicKey => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| malformed(field, "must be a string"))?;
                let candidate = text.trim();
                if !self.is_valid_public_key(candidate) {
                    return Err(malformed(field, "is not a valid public key"));
                }
                Ok(Value::String(candidate.to_string()))
            }
            FieldKind::Number { min, max } => {
                let number = parse_number(field, raw)?;
                if number < min || number > max {
                    return Err(malformed(
                        field,
                        &format!("must be between {} and {}", min, max),
                    ));
                }
                Ok(number_value(number))
            }
            FieldKind::Enum(allowed) => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| malformed(field, "must be a string"))?;
                self.reject_forbidden(field, text)?;
                let normalized = text.trim().to_lowercase();
                if !allowed.contains(&normalized.as_str()) {
                    return Err(malformed(
                        field,
                        &format!("must be one of: {}", allowed.join(", ")),
                    ));
                }
                Ok(Value::String(normalized))
            }
        }
    }

    /// Recursive sanitizer for tools without field rules.
    fn sanitize_generic(&self, path: &str, value: &Value) -> WardenResult<Value> {
        match value {
            Value::String(text) => {
                self.reject_forbidden(path, text)?;
                Ok(Value::String(clean_text(&truncate_chars(
                    text,
                    self.default_max_length,
                ))))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.sanitize_generic(&format!("{}[{}]", path, i), item))
                .collect::<WardenResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut clean = Map::new();
                for (key, item) in map {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    clean.insert(key.clone(), self.sanitize_generic(&child, item)?);
                }
                Ok(Value::Object(clean))
            }
            other => Ok(other.clone()),
        }
    }
}

impl InputValidator for ToolInputValidator {
    fn sanitize(&self, tool_name: &str, params: &Value) -> WardenResult<Value> {
        if self.passthrough_tools.contains(tool_name) {
            return Ok(params.clone());
        }

        let tool = strip_external_prefix(tool_name);
        match tool_rules(tool) {
            Some(rules) => self.validate_known(rules, params),
            None => self.sanitize_generic("", params),
        }
    }
}

fn malformed(field: &str, reason: &str) -> WardenError {
    WardenError::ValidationFailed {
        field: field.to_string(),
        reason: reason.to_string(),
        kind: ValidationKind::Malformed,
    }
}

fn scalar_text(field: &str, raw: &Value) -> WardenResult<String> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(malformed(field, "must be text")),
    }
}

fn parse_number(field: &str, raw: &Value) -> WardenResult<f64> {
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(malformed(field, "must be a valid number")),
    }
}

/// Integral values come back as JSON integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Remove angle brackets, escape bare ampersands, trim.
pub fn clean_text(text: &str) -> String {
    const ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "apos;"];

    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' | '>' => {}
            '&' => {
                let rest = &text[idx + 1..];
                if ENTITIES.iter().any(|e| rest.starts_with(e)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(ch),
        }
    }
    out.trim().to_string()
}
