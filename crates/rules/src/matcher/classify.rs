//! Last-match-wins classification shared by resolution and attribution.

use crate::model::RulePattern;

use super::{DirectiveOracle, MatchPath, PatternMatcher};

/// Outcome of classifying one path against one ordered pattern list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// The winning pattern is an inclusion.
    pub included: bool,
    /// Index of the last pattern that matched and counted.
    pub winner: Option<usize>,
    /// Inclusions whose glob matched but whose directive rejected the path,
    /// in declaration order.
    pub filtered: Vec<usize>,
}

impl Classification {
    /// Index of the last directive-rejected inclusion declared after the
    /// winner, i.e. the one that would have decided the path.
    pub fn overriding_filter(&self) -> Option<usize> {
        self.filtered
            .iter()
            .copied()
            .rev()
            .find(|&f| self.winner.map_or(true, |w| f > w))
    }
}

/// Classify `path`: every pattern is evaluated in order and the last one
/// that matches decides. An inclusion carrying a directive only counts
/// when the directive accepts the path; exclusions always count.
pub fn classify(
    path: &MatchPath,
    patterns: &[RulePattern],
    matcher: &dyn PatternMatcher,
    directives: &dyn DirectiveOracle,
) -> Classification {
    let mut out = Classification::default();

    for (index, pattern) in patterns.iter().enumerate() {
        if !matcher.is_match(index, path) {
            continue;
        }
        if !pattern.is_exclusion {
            if let Some(directive) = &pattern.directive {
                if !directives.accepts(directive, path) {
                    out.filtered.push(index);
                    continue;
                }
            }
        }
        out.winner = Some(index);
    }

    out.included = out
        .winner
        .is_some_and(|w| !patterns[w].is_exclusion);
    out
}
