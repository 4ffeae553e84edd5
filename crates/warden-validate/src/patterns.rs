//! Deny-list patterns for free text and the public-key surface format.

use regex::Regex;

use warden_contracts::error::{WardenError, WardenResult};

/// Built-in deny-list. Any string field matching one of these is rejected.
pub const DEFAULT_FORBIDDEN_PATTERNS: &[&str] = &[
    // Instruction override.
    r"(?i)ignore\s+(all\s+)?previous\s+instructions",
    r"(?i)ignore\s+(all\s+)?prior\s+instructions",
    r"(?i)disregard\s+(all\s+)?previous",
    r"(?i)forget\s+(all\s+)?previous",
    r"(?i)system\s*prompt",
    r"(?i)you\s+are\s+now",
    r"(?i)act\s+as\s+(a\s+)?different",
    r"(?i)pretend\s+to\s+be",
    r"(?i)jailbreak",
    r"(?i)DAN\s+mode",
    // Template and expression injection.
    r"\{\{.*\}\}",
    r"\$\{.*\}",
    r"<%.*%>",
    // Script injection.
    r"(?i)<script",
    r"(?i)javascript:",
    r"(?i)\bon\w+\s*=",
    // Statement chaining.
    r"(?i);\s*(DROP|DELETE|UPDATE|INSERT)",
    r"(?i)UNION\s+SELECT",
    // Null bytes and control characters.
    r"\x00",
    r"[\x01-\x08\x0B\x0C\x0E-\x1F]",
    // Prompt data delimiters: untrusted text may not close its own block.
    r"(?i)\[USER_DATA_(START|END)\]",
];

/// Base58 alphabet, 32 to 44 characters. Surface format only.
pub const PUBLIC_KEY_PATTERN: &str = r"^[1-9A-HJ-NP-Za-km-z]{32,44}$";

/// A compiled deny-list.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every pattern, failing with `WardenError::Config` on the first
    /// invalid one.
    pub fn compile<I, S>(patterns: I) -> WardenResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<WardenResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn defaults() -> WardenResult<Self> {
        Self::compile(DEFAULT_FORBIDDEN_PATTERNS)
    }

    /// The first pattern the text matches, if any.
    pub fn first_match(&self, text: &str) -> Option<&Regex> {
        self.patterns.iter().find(|re| re.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

pub fn compile_pattern(pattern: &str) -> WardenResult<Regex> {
    Regex::new(pattern).map_err(|e| WardenError::Config {
        reason: format!("invalid pattern '{}': {}", pattern, e),
    })
}
