//! Rule resolution engine for context bundles.
//!
//! This crate provides:
//! - Rule-line grammar with braces, directives and imports ([`parser`])
//! - Recursive import and alias expansion with cycle detection ([`expander`])
//! - Workspace aliases, the path sandbox and the interactive-rule guard ([`alias`])
//! - Last-match-wins matching and tier walking with `@find`/`@grep` filtering ([`matcher`])
//! - Per-file attribution of the deciding rule line ([`attribution`])
//! - [`ContextResolver`], tying the above together ([`engine`])

pub mod alias;
pub mod attribution;
pub mod engine;
pub mod error;
pub mod expander;
pub mod matcher;
pub mod model;
pub mod parser;

/// Per-project state directory holding rulesets.
pub const STATE_DIR: &str = ".ctxbundle";

pub use alias::{check_interactive_rule, AliasError, AliasResolver, RuleGuardError, Sandbox, WorkspaceAlias};
pub use attribution::{Attribution, AttributionReport, FileAttribution};
pub use engine::{ContextResolver, ResolvedContext};
pub use error::{Result, RuleError, SkippedRule};
pub use matcher::{IgnoreCache, WalkOptions};
pub use model::{
    CacheControl, ClassifiedPath, ContentDirective, ImportKind, ImportReference, PathStatus,
    RulePattern, RuleSet, Tier,
};
