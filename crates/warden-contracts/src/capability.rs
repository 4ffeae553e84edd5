//! Capability profiles: the static permission envelope of each role.
//!
//! A profile is configuration, not runtime state. The table is built once at
//! startup and never changes for the life of the process; the policy engine
//! only ever performs lookups against it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{WardenError, WardenResult};
use crate::role::AgentRole;

/// Where a role may write files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteScope {
    /// Any path that is not protected.
    Unrestricted,
    /// Only paths under one of these directory prefixes (e.g. `"app/"`).
    Prefixes(BTreeSet<String>),
}

impl WriteScope {
    /// Build a prefix scope from any iterable of string-likes.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WriteScope::Prefixes(prefixes.into_iter().map(Into::into).collect())
    }
}

/// The permissions bound to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// May invoke shell-execution tools at all.
    pub bash_allowed: bool,
    /// May run commands that touch keypairs and other credential material.
    pub credential_access: bool,
    /// May invoke spend-triggering external actions.
    pub can_spend: bool,
    /// Filesystem write envelope.
    pub write_scope: WriteScope,
    /// Command words this role may never run even though it has a shell
    /// (e.g. a UI role may not invoke chain-program build tooling).
    #[serde(default)]
    pub denied_commands: Vec<String>,
}

impl CapabilityProfile {
    /// A profile with no shell, no spend authority and no writable paths.
    pub fn locked() -> Self {
        Self {
            bash_allowed: false,
            credential_access: false,
            can_spend: false,
            write_scope: WriteScope::Prefixes(BTreeSet::new()),
            denied_commands: Vec::new(),
        }
    }
}

/// Role → profile lookup table covering every role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    profiles: BTreeMap<AgentRole, CapabilityProfile>,
}

impl CapabilityTable {
    /// Build a table, failing with `WardenError::Config` if any role is missing.
    pub fn new(profiles: BTreeMap<AgentRole, CapabilityProfile>) -> WardenResult<Self> {
        let missing: Vec<&str> = AgentRole::ALL
            .iter()
            .filter(|role| !profiles.contains_key(role))
            .map(|role| role.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(WardenError::Config {
                reason: format!(
                    "capability table has no profile for role(s): {}",
                    missing.join(", ")
                ),
            });
        }

        Ok(Self { profiles })
    }

    /// Build a table by asking `profile` for every role. Complete by
    /// construction.
    pub fn from_fn<F>(mut profile: F) -> Self
    where
        F: FnMut(AgentRole) -> CapabilityProfile,
    {
        Self {
            profiles: AgentRole::ALL.iter().map(|r| (*r, profile(*r))).collect(),
        }
    }

    /// Look up a role's profile.
    ///
    /// Always `Some` for a table built through `new`; callers still treat
    /// `None` as a denial.
    pub fn profile(&self, role: AgentRole) -> Option<&CapabilityProfile> {
        self.profiles.get(&role)
    }

    /// Replace one role's profile.
    pub fn set_profile(&mut self, role: AgentRole, profile: CapabilityProfile) {
        self.profiles.insert(role, profile);
    }

    /// Iterate over all (role, profile) pairs in role order.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentRole, &CapabilityProfile)> {
        self.profiles.iter()
    }

    /// Roles whose profile grants spend authority.
    pub fn spenders(&self) -> Vec<AgentRole> {
        self.profiles
            .iter()
            .filter(|(_, p)| p.can_spend)
            .map(|(role, _)| *role)
            .collect()
    }
}
