//! Gitignore-compatible matching, walking and classification.
//!
//! A tier's patterns are compiled once into a [`PatternMatcher`]. The
//! [`walker`] collects candidate paths from one `walkdir` pass per walk
//! root, and [`classify`] decides every path with last-match-wins. The
//! same [`PreparedTier`] evaluation feeds both resolution and attribution,
//! so the two cannot disagree.

mod binary;
mod classify;
mod directive;
mod glob;
mod vcs;
mod walker;


use std::path::{Path, PathBuf};

use ctxbundle_core::paths::to_slash;

pub use self::binary::is_binary;
pub use self::classify::{classify, Classification};
pub use self::directive::{grep_files, DirectiveFilter, DirectiveOracle, GrepJob};
pub use self::glob::GlobMatcher;
pub use self::vcs::{IgnoreCache, RepoIgnores};
pub use self::walker::{Candidate, Evaluation, PreparedTier, PrunedDir, WalkOptions};

/// A path presented to the matcher in both of its forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPath {
    pub path: PathBuf,
    /// Absolute path with `/` separators.
    pub absolute: String,
    /// Path relative to the working directory; `None` outside it.
    pub relative: Option<String>,
    /// Path relative to the walk root it was found under, set only when
    /// `relative` is `None`. Slash-free exclusions match this form.
    pub rooted: Option<String>,
    pub is_dir: bool,
}

impl MatchPath {
    pub fn new(path: &Path, work_dir: &Path, is_dir: bool) -> Self {
        let relative = path
            .strip_prefix(work_dir)
            .ok()
            .map(to_slash)
            .filter(|r| !r.is_empty());
        Self {
            path: path.to_path_buf(),
            absolute: to_slash(path),
            relative,
            rooted: None,
            is_dir,
        }
    }

    /// Record the walk root of a path outside the working directory.
    pub fn under_root(mut self, root: &Path) -> Self {
        if self.relative.is_none() {
            self.rooted = self
                .path
                .strip_prefix(root)
                .ok()
                .map(to_slash)
                .filter(|r| !r.is_empty());
        }
        self
    }

    /// Form seen by slash-free exclusions: the working-directory
    /// path, else the path below its walk root, else the file name.
    pub fn unanchored(&self) -> &str {
        if let Some(relative) = self.relative.as_deref().or(self.rooted.as_deref()) {
            return relative;
        }
        self.absolute
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.absolute)
    }

    /// Relative form when under the working directory, else absolute.
    pub fn display(&self) -> &str {
        self.relative.as_deref().unwrap_or(&self.absolute)
    }
}

/// Matches paths against a compiled pattern list by index.
///
/// Only the base glob is evaluated here; content directives and
/// polarity are handled by [`classify`].
pub trait PatternMatcher: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_match(&self, index: usize, path: &MatchPath) -> bool;
}
