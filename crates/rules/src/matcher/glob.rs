//! `globset`-backed [`PatternMatcher`].

use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tracing::warn;

use ctxbundle_core::paths::{normalize_lexically, to_slash};

use crate::error::SkippedRule;
use crate::model::RulePattern;

use super::{MatchPath, PatternMatcher};

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

pub(crate) fn has_glob(text: &str) -> bool {
    text.contains(GLOB_CHARS)
}

/// A pattern after working-directory normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Pattern text without `./`, trailing `/` or the implicit `**/`.
    pub text: String,
    /// Matched against absolute paths (written absolute, or `../`-rooted).
    pub absolute: bool,
    /// Trailing `/`: only directories match (or paths beneath them).
    pub dir_only: bool,
}

impl Normalized {
    fn new(raw: &str, is_exclusion: bool, work_dir: &Path) -> Self {
        let mut text = raw.trim();
        while let Some(rest) = text.strip_prefix("./") {
            text = rest;
        }
        let dir_only = text.len() > 1 && text.ends_with('/');
        let trimmed = if text.len() > 1 { text.trim_end_matches('/') } else { text };

        let (mut text, absolute) = if trimmed.starts_with('/') {
            (trimmed.to_string(), true)
        } else if trimmed == ".." || trimmed.starts_with("../") {
            (to_slash(&normalize_lexically(&work_dir.join(trimmed))), true)
        } else {
            (trimmed.to_string(), false)
        };

        let mut dir_only = dir_only;
        if !is_exclusion && !text.is_empty() && !has_glob(&text) {
            let target = if absolute {
                PathBuf::from(&text)
            } else {
                work_dir.join(&text)
            };
            if target.is_dir() {
                text = format!("{}/**", text.trim_end_matches('/'));
                dir_only = false;
            }
        }

        Self {
            text,
            absolute,
            dir_only,
        }
    }

    /// Glob compiled for this pattern. Slash-free relative patterns match
    /// at any depth.
    fn glob_text(&self) -> String {
        if !self.absolute && !self.text.contains('/') && !self.text.starts_with("**") {
            format!("**/{}", self.text)
        } else {
            self.text.clone()
        }
    }
}

#[derive(Debug)]
struct Entry {
    normalized: Normalized,
    is_exclusion: bool,
    glob: Option<globset::GlobMatcher>,
}

/// Compiled pattern list. Invalid globs never match.
#[derive(Debug)]
pub struct GlobMatcher {
    entries: Vec<Entry>,
}

impl GlobMatcher {
    /// Compile `patterns` against `work_dir`. Patterns that fail to compile
    /// are reported as skipped.
    pub fn compile(patterns: &[RulePattern], work_dir: &Path) -> (Self, Vec<SkippedRule>) {
        let mut skipped = Vec::new();
        let entries = patterns
            .iter()
            .map(|pattern| {
                let normalized = Normalized::new(&pattern.text, pattern.is_exclusion, work_dir);
                let glob = if normalized.text.is_empty() {
                    skipped.push(SkippedRule::new(
                        pattern.origin.clone(),
                        pattern.source_line,
                        pattern.to_string(),
                        "empty pattern",
                    ));
                    None
                } else {
                    match GlobBuilder::new(&normalized.glob_text())
                        .literal_separator(true)
                        .build()
                    {
                        Ok(glob) => Some(glob.compile_matcher()),
                        Err(e) => {
                            warn!(pattern = %pattern, error = %e, "invalid glob pattern");
                            skipped.push(SkippedRule::new(
                                pattern.origin.clone(),
                                pattern.source_line,
                                pattern.to_string(),
                                format!("invalid glob: {}", e),
                            ));
                            None
                        }
                    }
                };
                Entry {
                    normalized,
                    is_exclusion: pattern.is_exclusion,
                    glob,
                }
            })
            .collect();
        (Self { entries }, skipped)
    }

    pub fn normalized(&self, index: usize) -> Option<&Normalized> {
        self.entries.get(index).map(|e| &e.normalized)
    }
}

impl PatternMatcher for GlobMatcher {
    fn len(&self) -> usize {
        self.entries.len()
    }

    /// A pattern matches a path when it matches the path itself or any of
    /// its ancestor directories. Relative patterns only match inside the
    /// working directory, except slash-free exclusions, which also apply
    /// below every other walk root.
    fn is_match(&self, index: usize, path: &MatchPath) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        let Some(glob) = &entry.glob else {
            return false;
        };
        let subject = if entry.normalized.absolute {
            path.absolute.as_str()
        } else if !entry.is_exclusion || entry.normalized.text.contains('/') {
            match path.relative.as_deref() {
                Some(relative) => relative,
                None => return false,
            }
        } else {
            path.unanchored()
        };

        let ancestor_match = subject
            .match_indices('/')
            .filter(|(i, _)| *i > 0)
            .any(|(i, _)| glob.is_match(&subject[..i]));
        if ancestor_match {
            return true;
        }
        (!entry.normalized.dir_only || path.is_dir) && glob.is_match(subject)
    }
}
