//! Write-path checks.

use tracing::warn;

use warden_contracts::{
    capability::{CapabilityProfile, WriteScope},
    error::{WardenError, WardenResult},
    role::AgentRole,
};

/// A lexically normalized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    /// `/`-separated, with `.` and resolvable `..` segments removed.
    pub path: String,
    /// A relative path whose `..` segments climb above its starting point.
    pub escapes_root: bool,
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_path(raw: &str) -> NormalizedPath {
    let unified = raw.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    let mut escapes_root = false;
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && !absolute {
                    escapes_root = true;
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    NormalizedPath {
        path: if absolute { format!("/{}", joined) } else { joined },
        escapes_root,
    }
}

#[derive(Debug, Clone)]
pub struct PathPolicy {
    protected: Vec<String>,
    shared_prefixes: Vec<String>,
    /// Normalized, without a trailing slash.
    workspace_root: Option<String>,
}

impl PathPolicy {
    /// A `workspace_root` that is not absolute is a `Config` error.
    pub fn new(
        protected: &[String],
        shared_prefixes: &[String],
        workspace_root: Option<&str>,
    ) -> WardenResult<Self> {
        let workspace_root = match workspace_root {
            Some(raw) => {
                let root = normalize_path(raw);
                if !root.path.starts_with('/') {
                    return Err(WardenError::Config {
                        reason: format!("workspace root must be absolute: {}", raw),
                    });
                }
                Some(root.path.trim_end_matches('/').to_string())
            }
            None => None,
        };

        Ok(Self {
            protected: protected.iter().map(|p| p.to_lowercase()).collect(),
            shared_prefixes: shared_prefixes.to_vec(),
            workspace_root,
        })
    }

    /// Protected paths first, for every role; then the role's prefix scope.
    pub fn check(&self, raw: &str, role: AgentRole, profile: &CapabilityProfile) -> WardenResult<()> {
        let normalized = normalize_path(raw);
        // Bracket with slashes so protected entries like "/keys/" match whole
        // segments anywhere in the path.
        let haystack = format!("/{}/", normalized.path.trim_matches('/'));

        let lowered = haystack.to_lowercase();
        if let Some(protected) = self.protected.iter().find(|p| lowered.contains(p.as_str())) {
            warn!(role = %role, path = %raw, "blocked write to protected path");
            return Err(WardenError::Unauthorized {
                reason: format!("cannot write to protected path: {}", protected),
            });
        }

        let prefixes = match &profile.write_scope {
            WriteScope::Unrestricted => return Ok(()),
            WriteScope::Prefixes(prefixes) => prefixes,
        };

        let allowed = self.workspace_relative(&normalized).is_some_and(|relative| {
            prefixes
                .iter()
                .chain(self.shared_prefixes.iter())
                .any(|prefix| starts_with_segments(&relative, prefix))
        });
        if allowed {
            return Ok(());
        }

        let scope: Vec<&str> = prefixes
            .iter()
            .chain(self.shared_prefixes.iter())
            .map(String::as_str)
            .collect();
        warn!(role = %role, path = %raw, "write outside role scope");
        Err(WardenError::Unauthorized {
            reason: format!("{} agent can only write to {}", role, scope.join(", ")),
        })
    }

    /// The path relative to the workspace, or `None` when it lies outside.
    fn workspace_relative(&self, normalized: &NormalizedPath) -> Option<String> {
        if normalized.escapes_root {
            return None;
        }
        if !normalized.path.starts_with('/') {
            return Some(normalized.path.clone());
        }
        let root = self.workspace_root.as_deref()?;
        let rest = normalized.path.strip_prefix(root)?;
        rest.strip_prefix('/').map(str::to_string)
    }
}

/// `"app/page.tsx"` starts with `"app/"`; `"webapp/x"` and `"programs/app/x"`
/// do not.
fn starts_with_segments(relative: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    !prefix.is_empty() && format!("{}/", relative).starts_with(&format!("{}/", prefix))
}
