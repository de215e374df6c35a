//! Recursive expansion of a rule file into hot and cold pattern lists.
//!
//! Imports (`@a:<alias>::<ruleset>`, `git::<url>@<ref>::<ruleset>`,
//! `@default: <project>`) are resolved and flattened into the importing
//! file in declaration order. Patterns pulled in through an import are
//! rebased onto the imported project and credited to the importing line.

mod core;
mod rebase;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ctxbundle_core::paths::canonical_or_normalized;

pub use self::core::RuleExpander;
pub use self::rebase::{rebase_pattern, rebase_view};

/// Sub-directories of a project's state directory searched for named
/// rulesets, in priority order (checked in, then local).
pub const RULESET_DIRS: &[&str] = &["rulesets", "local/rulesets"];

/// Extension of rule files.
pub const RULES_EXT: &str = "rules";

/// Canonical rule-file paths visited during one top-level expansion.
///
/// Entries are never removed, so a ruleset imported twice through
/// different paths contributes once.
#[derive(Debug, Default)]
pub struct VisitedSet {
    paths: HashSet<PathBuf>,
}

impl VisitedSet {
    /// Record `path`; `false` when it was already present.
    pub fn insert(&mut self, path: &Path) -> bool {
        self.paths.insert(canonical_or_normalized(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&canonical_or_normalized(path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Locate `<target>/.ctxbundle/{rulesets,local/rulesets}/<name>.rules`.
pub fn find_ruleset(target: &Path, name: &str) -> Option<PathBuf> {
    let file = format!("{}.{}", name, RULES_EXT);
    RULESET_DIRS
        .iter()
        .map(|dir| target.join(crate::STATE_DIR).join(dir).join(&file))
        .find(|path| path.is_file())
}
