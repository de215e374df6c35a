//! Resolution data model: patterns, rule sets, imports and classified paths.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::SkippedRule;

/// Inline content filter narrowing a pattern's matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "query", rename_all = "lowercase")]
pub enum ContentDirective {
    /// Path substring.
    Find(String),
    /// File content substring.
    Grep(String),
}

impl ContentDirective {
    pub fn query(&self) -> &str {
        match self {
            Self::Find(q) | Self::Grep(q) => q,
        }
    }

    pub fn is_grep(&self) -> bool {
        matches!(self, Self::Grep(_))
    }
}

impl fmt::Display for ContentDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find(q) => write!(f, "@find: {:?}", q),
            Self::Grep(q) => write!(f, "@grep: {:?}", q),
        }
    }
}

/// One resolved pattern. Order within a tier is load-bearing: later entries
/// override earlier ones for a matching path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RulePattern {
    /// Glob text without the leading `!`.
    pub text: String,
    pub is_exclusion: bool,
    /// Line in `origin` this pattern was written on.
    pub source_line: usize,
    /// Top-level line credited for this pattern (the importing line for
    /// patterns pulled in through imports).
    pub effective_line: usize,
    pub directive: Option<ContentDirective>,
    /// Rule file the pattern came from.
    pub origin: PathBuf,
}

impl RulePattern {
    pub fn new(text: impl Into<String>, is_exclusion: bool, line: usize, origin: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            is_exclusion,
            source_line: line,
            effective_line: line,
            directive: None,
            origin: origin.into(),
        }
    }

    pub fn with_directive(mut self, directive: Option<ContentDirective>) -> Self {
        self.directive = directive;
        self
    }

    pub fn credited_to(mut self, effective_line: usize) -> Self {
        self.effective_line = effective_line;
        self
    }
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exclusion {
            f.write_str("!")?;
        }
        f.write_str(&self.text)?;
        if let Some(directive) = &self.directive {
            write!(f, " {}", directive)?;
        }
        Ok(())
    }
}

/// Context tier. Cold always overrides hot for the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Cold,
}

/// Cache-control flags declared by the top-level rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheControl {
    pub freeze: bool,
    pub no_expire: bool,
    pub disabled: bool,
    pub expire_after: Option<Duration>,
}

/// Fully expanded rules: two ordered tiers plus navigation hints,
/// cache flags, and every recoverable failure met along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleSet {
    pub hot: Vec<RulePattern>,
    pub cold: Vec<RulePattern>,
    pub views: Vec<String>,
    pub cache: CacheControl,
    pub skipped: Vec<SkippedRule>,
}

impl RuleSet {
    pub fn tier(&self, tier: Tier) -> &[RulePattern] {
        match tier {
            Tier::Hot => &self.hot,
            Tier::Cold => &self.cold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hot.is_empty() && self.cold.is_empty()
    }

    /// Append another set. With `into_cold`, both of its tiers land in cold.
    pub fn merge(&mut self, other: RuleSet, into_cold: bool) {
        if into_cold {
            self.cold.extend(other.hot);
        } else {
            self.hot.extend(other.hot);
        }
        self.cold.extend(other.cold);
        self.views.extend(other.views);
        self.skipped.extend(other.skipped);
    }
}

/// What an import line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `@a:<alias>::<ruleset>`
    AliasRuleset,
    /// `@default: <project path>`
    ProjectDefault,
    /// `git::<url>@<ref>::<ruleset>`
    GitRuleset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReference {
    pub kind: ImportKind,
    /// Alias, project path, or repository URL.
    pub identifier: String,
    /// Named ruleset (absent for project defaults).
    pub ruleset: Option<String>,
    /// Git ref for repository imports.
    pub reference: Option<String>,
    pub source_line: usize,
    pub directive: Option<ContentDirective>,
}

/// Final status of a path after one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStatus {
    IncludedHot,
    IncludedCold,
    ExcludedByRule,
    OmittedNoMatch,
    IgnoredByVcs,
    Directory,
}

impl PathStatus {
    pub fn is_included(self) -> bool {
        matches!(self, Self::IncludedHot | Self::IncludedCold)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedPath {
    pub path: PathBuf,
    pub status: PathStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_display_round_trips_markers() {
        let p = RulePattern::new("src/**/*.go", true, 3, "/r/rules")
            .with_directive(Some(ContentDirective::Grep("TODO".into())));
        assert_eq!(p.to_string(), "!src/**/*.go @grep: \"TODO\"");
    }

    #[test]
    fn merge_into_cold_collapses_tiers() {
        let mut parent = RuleSet::default();
        let child = RuleSet {
            hot: vec![RulePattern::new("a", false, 1, "/x")],
            cold: vec![RulePattern::new("b", false, 3, "/x")],
            ..RuleSet::default()
        };
        parent.merge(child, true);
        assert!(parent.hot.is_empty());
        let texts: Vec<_> = parent.cold.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn merge_hot_keeps_tiers() {
        let mut parent = RuleSet::default();
        let child = RuleSet {
            hot: vec![RulePattern::new("a", false, 1, "/x")],
            cold: vec![RulePattern::new("b", false, 3, "/x")],
            ..RuleSet::default()
        };
        parent.merge(child, false);
        assert_eq!(parent.hot.len(), 1);
        assert_eq!(parent.cold.len(), 1);
    }
}
