//! Scrubbing applied to everything before it is persisted.
//!
//! Secret-bearing fields are replaced, long strings are cut with an explicit
//! marker, client identifiers are shortened and network addresses hashed.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const REDACTED: &str = "[REDACTED]";

/// Field names (normalized) whose values never reach a log file. A key is
/// sensitive when its normalized form contains any of these.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "privatekey",
    "secretkey",
    "seedphrase",
    "seed",
    "token",
    "apikey",
    "mnemonic",
];

/// Most visible characters of a client id.
pub const ACTOR_PREFIX_LEN: usize = 8;

/// Hex characters kept from the SHA-256 of a network address.
pub const IP_HASH_LEN: usize = 16;

/// Lowercase and drop `_`, `-` and spaces, so `API_KEY`, `apiKey` and
/// `api-key` all compare equal.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    SENSITIVE_FIELDS.iter().any(|f| normalized.contains(f))
}

/// Replace the value of every sensitive field, at any depth.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    let clean = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(item)
                    };
                    (key.clone(), clean)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Cut one string to `max` characters, noting how many were dropped.
pub fn truncate_text(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{}... [{} more characters]", kept, total - max)
}

/// Apply `truncate_text` to every string, at any depth.
pub fn truncate_strings(value: &Value, max: usize) -> Value {
    match value {
        Value::String(text) => Value::String(truncate_text(text, max)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), truncate_strings(item, max)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items.iter().map(|item| truncate_strings(item, max)).collect(),
        ),
        other => other.clone(),
    }
}

/// `redact` then `truncate_strings`.
pub fn scrub(value: &Value, max: usize) -> Value {
    truncate_strings(&redact(value), max)
}

/// The loggable form of a client id: at most `ACTOR_PREFIX_LEN` characters
/// and never more than half of it, so a short id is not logged whole.
pub fn actor_prefix(client_id: &str) -> String {
    let keep = ACTOR_PREFIX_LEN.min(client_id.chars().count() / 2);
    let prefix: String = client_id.chars().take(keep).collect();
    format!("{}...", prefix)
}

/// One-way hash of a network address, for correlation only.
pub fn hash_address(addr: &str) -> String {
    let digest = hex::encode(Sha256::digest(addr.as_bytes()));
    digest[..IP_HASH_LEN].to_string()
}
