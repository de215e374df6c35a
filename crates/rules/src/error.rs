//! Error types and the skipped-rule record for resolution.

use std::path::PathBuf;

use serde::Serialize;

use ctxbundle_core::CoreError;

use crate::alias::AliasError;

/// Resolution-fatal errors. Everything recoverable is recorded as a
/// [`SkippedRule`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The top-level rule file could not be read.
    #[error("failed to read rule file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `@expire-time` with a missing or unparseable duration.
    #[error("line {line}: invalid @expire-time duration {value:?}: {reason}")]
    InvalidExpireTime {
        line: usize,
        value: String,
        reason: String,
    },

    /// Workspace discovery failed, so allowed roots cannot be computed.
    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    /// An import could not be resolved. Recoverable below the top level.
    #[error("cannot import {identifier:?}: {reason}")]
    Import { identifier: String, reason: String },

    /// A path lies outside every allowed root.
    #[error("{0} is outside every allowed root")]
    Disallowed(PathBuf),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RuleError {
    /// Whether the error aborts resolution even inside a nested import.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SandboxUnavailable(_) | Self::InvalidExpireTime { .. }
        )
    }

    pub(crate) fn import(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Import {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// A rule that contributed nothing, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    /// Line number within `file`.
    pub line: usize,
    pub text: String,
    pub reason: String,
    /// Rule file the line came from.
    pub file: PathBuf,
}

impl SkippedRule {
    pub fn new(
        file: impl Into<PathBuf>,
        line: usize,
        text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            line,
            text: text.into(),
            reason: reason.into(),
            file: file.into(),
        }
    }
}
