//! Agent roles and the organizational groups they belong to.
//!
//! The role set is closed: every autonomous process runs as exactly one of
//! these roles for its whole lifetime, and every policy table in the
//! workspace is keyed by it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// The identity class of one autonomous agent process.
///
/// Serialized in lower case (`"ops"`, `"web3"`, ...) so it reads naturally in
/// TOML configuration and in persisted budget rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Operations lead. The only role allowed near credential material.
    Ops,
    /// Engineering lead.
    Dev,
    /// UI specialist.
    Frontend,
    /// Server and tooling specialist.
    Backend,
    /// On-chain program specialist.
    Web3,
    /// Marketing lead.
    Marketing,
    Content,
    Social,
    Analytics,
    /// Sales lead.
    Sales,
    Research,
    Outreach,
    Proposals,
}

/// The team a role reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleGroup {
    Leadership,
    Engineering,
    Marketing,
    Sales,
}

impl AgentRole {
    /// Every role, in declaration order.
    pub const ALL: [AgentRole; 13] = [
        AgentRole::Ops,
        AgentRole::Dev,
        AgentRole::Frontend,
        AgentRole::Backend,
        AgentRole::Web3,
        AgentRole::Marketing,
        AgentRole::Content,
        AgentRole::Social,
        AgentRole::Analytics,
        AgentRole::Sales,
        AgentRole::Research,
        AgentRole::Outreach,
        AgentRole::Proposals,
    ];

    /// The stable lower-case name used in configuration and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Ops => "ops",
            AgentRole::Dev => "dev",
            AgentRole::Frontend => "frontend",
            AgentRole::Backend => "backend",
            AgentRole::Web3 => "web3",
            AgentRole::Marketing => "marketing",
            AgentRole::Content => "content",
            AgentRole::Social => "social",
            AgentRole::Analytics => "analytics",
            AgentRole::Sales => "sales",
            AgentRole::Research => "research",
            AgentRole::Outreach => "outreach",
            AgentRole::Proposals => "proposals",
        }
    }

    pub fn group(&self) -> RoleGroup {
        match self {
            AgentRole::Ops => RoleGroup::Leadership,
            AgentRole::Dev | AgentRole::Frontend | AgentRole::Backend | AgentRole::Web3 => {
                RoleGroup::Engineering
            }
            AgentRole::Marketing | AgentRole::Content | AgentRole::Social | AgentRole::Analytics => {
                RoleGroup::Marketing
            }
            AgentRole::Sales | AgentRole::Research | AgentRole::Outreach | AgentRole::Proposals => {
                RoleGroup::Sales
            }
        }
    }

    /// True for the operations lead and the three team leads.
    pub fn is_lead(&self) -> bool {
        matches!(
            self,
            AgentRole::Ops | AgentRole::Dev | AgentRole::Marketing | AgentRole::Sales
        )
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AgentRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| WardenError::Config {
                reason: format!("unknown agent role '{}'", s),
            })
    }
}
