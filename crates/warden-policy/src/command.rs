//! Shell command checks.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::warn;

use warden_contracts::{
    capability::{CapabilityProfile, CapabilityTable},
    error::{WardenError, WardenResult},
    role::AgentRole,
};

#[derive(Debug, Clone)]
pub struct CommandPolicy {
    blocked: Vec<Regex>,
    credential: Vec<Regex>,
    /// Per-role command words, each compiled to match as a whole word.
    role_denied: BTreeMap<AgentRole, Vec<(String, Regex)>>,
}

impl CommandPolicy {
    pub fn new(
        blocked: &[String],
        credential: &[String],
        capabilities: &CapabilityTable,
    ) -> WardenResult<Self> {
        let mut role_denied = BTreeMap::new();
        for (role, profile) in capabilities.iter() {
            let words = profile
                .denied_commands
                .iter()
                .map(|word| Ok((word.clone(), command_word(word)?)))
                .collect::<WardenResult<Vec<_>>>()?;
            role_denied.insert(*role, words);
        }

        Ok(Self {
            blocked: compile_all(blocked)?,
            credential: compile_all(credential)?,
            role_denied,
        })
    }

    /// Run every shell check for `role`, in order. The first failure wins.
    pub fn check(
        &self,
        command: &str,
        role: AgentRole,
        profile: &CapabilityProfile,
    ) -> WardenResult<()> {
        if let Some(pattern) = self.blocked.iter().find(|re| re.is_match(command)) {
            warn!(role = %role, pattern = %pattern.as_str(), "blocked dangerous command");
            return Err(WardenError::Unauthorized {
                reason: format!("blocked dangerous command pattern: {}", pattern.as_str()),
            });
        }

        if !profile.credential_access && self.credential.iter().any(|re| re.is_match(command)) {
            warn!(role = %role, "blocked credential access");
            return Err(WardenError::Unauthorized {
                reason: format!("{} agent may not access keypairs or credential material", role),
            });
        }

        if !profile.bash_allowed {
            return Err(WardenError::Unauthorized {
                reason: format!("{} agent does not have shell access", role),
            });
        }

        let lowered = command.to_lowercase();
        if lowered.contains("mainnet") && !lowered.contains("devnet") {
            warn!(role = %role, "blocked mainnet operation");
            return Err(WardenError::Unauthorized {
                reason: "mainnet operations require human approval".to_string(),
            });
        }

        if let Some(words) = self.role_denied.get(&role) {
            if let Some((word, _)) = words.iter().find(|(_, re)| re.is_match(command)) {
                warn!(role = %role, command = %word, "role may not run command");
                return Err(WardenError::Unauthorized {
                    reason: format!("{} agent may not run '{}' commands", role, word),
                });
            }
        }

        Ok(())
    }
}

fn compile_all(patterns: &[String]) -> WardenResult<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

fn compile(pattern: &str) -> WardenResult<Regex> {
    Regex::new(pattern).map_err(|e| WardenError::Config {
        reason: format!("invalid command pattern '{}': {}", pattern, e),
    })
}

/// `word` as a command: at the start, after a separator, quote or path
/// slash, and followed by whitespace, a closing quote or the end.
fn command_word(word: &str) -> WardenResult<Regex> {
    compile(&format!(
        r#"(?:^|[\s;&|()`'"/]){}(?:[\s'"]|$)"#,
        regex::escape(word)
    ))
}
