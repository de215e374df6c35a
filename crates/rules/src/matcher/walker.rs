//! Candidate collection and per-tier evaluation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use ctxbundle_core::WORKTREES_DIR;

use crate::alias::literal_base;
use crate::error::SkippedRule;
use crate::model::{ContentDirective, PathStatus, RulePattern, Tier};
use crate::STATE_DIR;

use super::binary::is_binary;
use super::classify::{classify, Classification};
use super::directive::{DirectiveFilter, GrepJob};
use super::glob::{has_glob, GlobMatcher};
use super::vcs::IgnoreCache;
use super::{MatchPath, PatternMatcher};

const VCS_DIR: &str = ".git";

/// Knobs for one walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Worker threads for `@grep:` filtering.
    pub grep_workers: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { grep_workers: 4 }
    }
}

/// A path met during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Ignored by the enclosing repository.
    pub ignored: bool,
}

/// A directory skipped entirely because an exclusion named it and nothing
/// later in the tier could include anything again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedDir {
    pub path: PathBuf,
    /// Index of the excluding pattern.
    pub pattern: usize,
}

/// Verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Directory,
    IgnoredByVcs,
    Classified {
        classification: Classification,
        /// Included by glob, but binary without an explicit opt-in.
        binary_skipped: bool,
    },
}

impl Evaluation {
    pub fn is_included(&self) -> bool {
        matches!(
            self,
            Self::Classified {
                classification,
                binary_skipped: false,
            } if classification.included
        )
    }

    pub fn status(&self, tier: Tier) -> PathStatus {
        match self {
            Self::Directory => PathStatus::Directory,
            Self::IgnoredByVcs => PathStatus::IgnoredByVcs,
            Self::Classified { .. } if self.is_included() => match tier {
                Tier::Hot => PathStatus::IncludedHot,
                Tier::Cold => PathStatus::IncludedCold,
            },
            Self::Classified { classification, .. } if classification.winner.is_some() && !classification.included => {
                PathStatus::ExcludedByRule
            }
            Self::Classified { .. } => PathStatus::OmittedNoMatch,
        }
    }
}

/// One tier's patterns, compiled and walked, ready to be evaluated.
///
/// Resolution and attribution both go through [`PreparedTier::evaluate`].
pub struct PreparedTier {
    pub tier: Tier,
    pub patterns: Vec<RulePattern>,
    pub matcher: GlobMatcher,
    /// Walked paths, sorted.
    pub candidates: Vec<Candidate>,
    pub pruned: Vec<PrunedDir>,
    pub directives: DirectiveFilter,
    /// Patterns that failed to compile.
    pub skipped: Vec<SkippedRule>,
    work_dir: PathBuf,
    /// Walk roots and the parents of directly named files.
    roots: Vec<PathBuf>,
}

impl PreparedTier {
    pub fn prepare(
        tier: Tier,
        patterns: Vec<RulePattern>,
        work_dir: &Path,
        ignores: &IgnoreCache,
        options: &WalkOptions,
    ) -> Self {
        let (matcher, skipped) = GlobMatcher::compile(&patterns, work_dir);
        let plan = WalkPlan::new(&patterns, &matcher, work_dir);
        let (candidates, pruned) = plan.walk(ignores);
        let roots = plan.match_roots();
        let directives =
            grep_candidates(&patterns, &matcher, &candidates, work_dir, &roots, options);

        debug!(
            ?tier,
            patterns = patterns.len(),
            candidates = candidates.len(),
            pruned = pruned.len(),
            "tier prepared"
        );
        Self {
            tier,
            patterns,
            matcher,
            candidates,
            pruned,
            directives,
            skipped,
            work_dir: work_dir.to_path_buf(),
            roots,
        }
    }

    pub fn match_path(&self, candidate: &Candidate) -> MatchPath {
        match_path(&candidate.path, candidate.is_dir, &self.work_dir, &self.roots)
    }

    pub fn evaluate(&self, candidate: &Candidate) -> Evaluation {
        if candidate.is_dir {
            return Evaluation::Directory;
        }
        if candidate.ignored {
            return Evaluation::IgnoredByVcs;
        }
        let path = self.match_path(candidate);
        let classification = classify(&path, &self.patterns, &self.matcher, &self.directives);
        let binary_skipped = match classification.winner {
            Some(winner) if classification.included => {
                is_binary(&candidate.path) && !opts_in_binary(&self.patterns[winner], &candidate.path)
            }
            _ => false,
        };
        Evaluation::Classified {
            classification,
            binary_skipped,
        }
    }

    /// Included files, sorted.
    pub fn included(&self) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .filter(|c| self.evaluate(c).is_included())
            .map(|c| c.path.clone())
            .collect()
    }
}

/// The outermost root holding `path` anchors it when it lies outside the
/// working directory.
fn match_path(path: &Path, is_dir: bool, work_dir: &Path, roots: &[PathBuf]) -> MatchPath {
    let base = MatchPath::new(path, work_dir, is_dir);
    if base.relative.is_some() {
        return base;
    }
    match roots
        .iter()
        .filter(|root| path.starts_with(root) && path != root.as_path())
        .min_by_key(|root| root.components().count())
    {
        Some(root) => base.under_root(root),
        None => base,
    }
}

/// A binary file is included only when the winning pattern names its
/// extension or its file name.
fn opts_in_binary(pattern: &RulePattern, path: &Path) -> bool {
    let text = pattern.text.trim_end_matches('/');
    let by_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| text.rsplit('/').next() == Some(name));
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            text.to_ascii_lowercase()
                .ends_with(&format!(".{}", ext.to_ascii_lowercase()))
        });
    by_name || by_ext
}

/// Roots and pruning rules derived from one tier.
struct WalkPlan<'p> {
    work_dir: &'p Path,
    roots: Vec<PathBuf>,
    /// Files named directly by wildcard-free absolute inclusions.
    direct_files: Vec<PathBuf>,
    keep_worktrees: bool,
    /// Directory name → index of the exclusion that prunes it.
    pruned_names: HashMap<String, usize>,
}

impl<'p> WalkPlan<'p> {
    fn new(patterns: &[RulePattern], matcher: &GlobMatcher, work_dir: &'p Path) -> Self {
        let mut roots = Vec::new();
        let mut direct_files = Vec::new();
        let mut pruned_names = HashMap::new();

        for (index, pattern) in patterns.iter().enumerate() {
            let Some(normalized) = matcher.normalized(index) else {
                continue;
            };
            if normalized.text.is_empty() {
                continue;
            }
            if pattern.is_exclusion {
                let literal_name = !normalized.absolute
                    && !normalized.text.contains('/')
                    && !has_glob(&normalized.text);
                let reincluded = patterns[index + 1..].iter().any(|p| !p.is_exclusion);
                if literal_name && !reincluded {
                    pruned_names.insert(normalized.text.clone(), index);
                }
                continue;
            }
            if !normalized.absolute {
                roots.push(work_dir.to_path_buf());
                continue;
            }
            let base = literal_base(&normalized.text);
            if base.is_file() {
                direct_files.push(base);
            } else if base.is_dir() {
                roots.push(base);
            } else {
                debug!(pattern = %pattern, base = %base.display(), "inclusion base does not exist");
            }
        }

        roots.sort();
        roots.dedup();
        let mut distinct: Vec<PathBuf> = Vec::with_capacity(roots.len());
        for root in roots {
            if !distinct.iter().any(|kept| root.starts_with(kept)) {
                distinct.push(root);
            }
        }

        let keep_worktrees = patterns
            .iter()
            .any(|p| !p.is_exclusion && p.text.contains(WORKTREES_DIR));

        Self {
            work_dir,
            roots: distinct,
            direct_files,
            keep_worktrees,
            pruned_names,
        }
    }

    fn match_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.roots.clone();
        roots.extend(self.direct_files.iter().filter_map(|f| f.parent().map(Path::to_path_buf)));
        roots.sort();
        roots.dedup();
        roots
    }

    /// Pattern index when `entry` is pruned by a named exclusion. The
    /// working directory and its ancestors are never pruned.
    fn pruned_by(&self, entry: &DirEntry) -> Option<usize> {
        if self.pruned_names.is_empty() || self.work_dir.starts_with(entry.path()) {
            return None;
        }
        entry
            .file_name()
            .to_str()
            .and_then(|name| self.pruned_names.get(name).copied())
    }

    fn always_skipped(&self, entry: &DirEntry) -> bool {
        match entry.file_name().to_str() {
            Some(VCS_DIR) | Some(STATE_DIR) => true,
            Some(WORKTREES_DIR) => !self.keep_worktrees,
            _ => false,
        }
    }

    fn walk(&self, ignores: &IgnoreCache) -> (Vec<Candidate>, Vec<PrunedDir>) {
        let mut found: BTreeMap<PathBuf, Candidate> = BTreeMap::new();
        let mut pruned = Vec::new();

        for file in &self.direct_files {
            found.insert(
                file.clone(),
                Candidate {
                    path: file.clone(),
                    is_dir: false,
                    ignored: ignores.is_ignored(file, false),
                },
            );
        }

        for root in &self.roots {
            let walker = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    if entry.depth() == 0 || !entry.file_type().is_dir() {
                        return true;
                    }
                    if self.always_skipped(entry) {
                        return false;
                    }
                    if let Some(pattern) = self.pruned_by(entry) {
                        pruned.push(PrunedDir {
                            path: entry.path().to_path_buf(),
                            pattern,
                        });
                        return false;
                    }
                    !ignores.is_ignored(entry.path(), true)
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(root = %root.display(), error = %e, "walk error, skipping entry");
                        continue;
                    }
                };
                if entry.depth() == 0 {
                    continue;
                }
                let path = entry.path().to_path_buf();
                let file_type = entry.file_type();
                let is_dir = file_type.is_dir();
                if file_type.is_symlink() && path.is_dir() {
                    debug!(path = %path.display(), "symlinked directory not followed");
                    continue;
                }
                let ignored = !is_dir && ignores.is_ignored(&path, false);
                found.insert(
                    path.clone(),
                    Candidate {
                        path,
                        is_dir,
                        ignored,
                    },
                );
            }
        }

        (found.into_values().collect(), pruned)
    }
}

/// Run `@grep:` for every file whose glob matches an inclusion carrying
/// a grep directive.
fn grep_candidates(
    patterns: &[RulePattern],
    matcher: &GlobMatcher,
    candidates: &[Candidate],
    work_dir: &Path,
    roots: &[PathBuf],
    options: &WalkOptions,
) -> DirectiveFilter {
    let grep_patterns: Vec<(usize, &str)> = patterns
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match (&p.directive, p.is_exclusion) {
            (Some(ContentDirective::Grep(q)), false) => Some((i, q.as_str())),
            _ => None,
        })
        .collect();
    if grep_patterns.is_empty() {
        return DirectiveFilter::default();
    }

    let jobs: Vec<GrepJob> = candidates
        .iter()
        .filter(|c| !c.is_dir && !c.ignored)
        .filter_map(|c| {
            let path = match_path(&c.path, false, work_dir, roots);
            let mut queries: Vec<String> = grep_patterns
                .iter()
                .filter(|(i, _)| matcher.is_match(*i, &path))
                .map(|(_, q)| q.to_string())
                .collect();
            queries.dedup();
            (!queries.is_empty()).then(|| GrepJob {
                path: c.path.clone(),
                queries,
            })
        })
        .collect();

    DirectiveFilter::from_jobs(jobs, options.grep_workers)
}
