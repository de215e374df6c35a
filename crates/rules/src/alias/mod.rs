//! Workspace aliases, the path sandbox, and the interactive-rule guard.
//!
//! Aliases are colon-delimited identifiers (`name`, `ecosystem:repo`,
//! `ecosystem:repo:worktree`) resolved against the workspace catalog.
//! The catalog snapshot is taken at most once per [`AliasResolver`] and is
//! shared with the [`Sandbox`], which derives allowed roots from it.

mod guard;
mod resolver;
mod sandbox;

#[cfg(test)]
mod tests;

pub use self::guard::{check_interactive_rule, RuleGuardError};
pub use self::resolver::AliasResolver;
pub use self::sandbox::{literal_base, Sandbox};

/// Errors raised while parsing or resolving a workspace alias.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasError {
    #[error("invalid alias {alias:?}: {reason}")]
    Invalid { alias: String, reason: String },

    #[error("no workspace matches alias {0:?}")]
    NotFound(String),

    #[error("workspace discovery failed: {0}")]
    Discovery(String),
}

/// A parsed alias: one to three colon-separated components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceAlias {
    /// `name`
    Name(String),
    /// `ecosystem:repo`, or `repo:worktree` as fallback.
    Pair(String, String),
    /// `ecosystem:repo:worktree`
    Triple(String, String, String),
}

impl WorkspaceAlias {
    pub fn parse(raw: &str) -> Result<Self, AliasError> {
        let invalid = |reason: &str| AliasError::Invalid {
            alias: raw.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = raw.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty component"));
        }
        match parts.as_slice() {
            [name] => Ok(Self::Name(name.to_string())),
            [a, b] => Ok(Self::Pair(a.to_string(), b.to_string())),
            [a, b, c] => Ok(Self::Triple(a.to_string(), b.to_string(), c.to_string())),
            _ => Err(invalid("expected at most three components")),
        }
    }
}
