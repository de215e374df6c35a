//! Allowed-roots sandbox for paths that leave the working directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use ctxbundle_core::paths::{canonical_or_normalized, is_within, normalize_lexically};

use crate::error::{Result, RuleError, SkippedRule};
use crate::model::RulePattern;

use super::AliasResolver;

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// Roots derived from the catalog, computed once.
#[derive(Debug, Default)]
struct Roots {
    allowed: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
}

/// Decides which locations resolution may read.
///
/// Deny entries and excluded workspaces are checked first, so an explicit
/// deny always wins over an allowed root that contains it.
pub struct Sandbox {
    aliases: Arc<AliasResolver>,
    allowed_paths: Vec<PathBuf>,
    denied_paths: Vec<PathBuf>,
    config_dir: Option<PathBuf>,
    roots: RwLock<Option<Arc<Roots>>>,
}

impl Sandbox {
    pub fn new(aliases: Arc<AliasResolver>) -> Self {
        Self {
            aliases,
            allowed_paths: Vec::new(),
            denied_paths: Vec::new(),
            config_dir: None,
            roots: RwLock::new(None),
        }
    }

    pub fn allow(mut self, path: impl AsRef<Path>) -> Self {
        self.allowed_paths.push(canonical_or_normalized(path.as_ref()));
        self
    }

    pub fn deny(mut self, path: impl AsRef<Path>) -> Self {
        self.denied_paths.push(canonical_or_normalized(path.as_ref()));
        self
    }

    pub fn with_config_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config_dir = Some(canonical_or_normalized(path.as_ref()));
        self
    }

    fn roots(&self) -> Result<Arc<Roots>> {
        if let Some(cached) = self.roots.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Ok(Arc::clone(cached));
        }

        let mut guard = self.roots.write().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let workspaces = self
            .aliases
            .workspaces()
            .map_err(|e| RuleError::SandboxUnavailable(e.to_string()))?;

        let mut roots = Roots::default();
        for ws in workspaces.iter() {
            let path = canonical_or_normalized(&ws.path);
            if ws.excluded {
                roots.excluded.push(path);
            } else {
                roots.allowed.push(path);
            }
        }
        debug!(
            allowed = roots.allowed.len(),
            excluded = roots.excluded.len(),
            "sandbox roots computed"
        );
        let roots = Arc::new(roots);
        *guard = Some(Arc::clone(&roots));
        Ok(roots)
    }

    /// Whether resolution may read `path`.
    pub fn is_path_allowed(&self, path: &Path) -> Result<bool> {
        let roots = self.roots()?;
        let path = canonical_or_normalized(path);

        if self.denied_paths.iter().any(|d| is_within(&path, d))
            || roots.excluded.iter().any(|r| is_within(&path, r))
        {
            return Ok(false);
        }

        Ok(roots.allowed.iter().any(|r| is_within(&path, r))
            || self.allowed_paths.iter().any(|a| is_within(&path, a))
            || self.config_dir.as_deref().is_some_and(|c| is_within(&path, c)))
    }

    /// Drop absolute and `../` patterns whose literal base is not allowed.
    ///
    /// Patterns relative to `work_dir` without parent segments are kept
    /// untouched.
    pub fn filter_patterns(
        &self,
        patterns: Vec<RulePattern>,
        work_dir: &Path,
    ) -> Result<(Vec<RulePattern>, Vec<SkippedRule>)> {
        let mut kept = Vec::with_capacity(patterns.len());
        let mut skipped = Vec::new();

        for pattern in patterns {
            if !leaves_work_dir(&pattern.text) {
                kept.push(pattern);
                continue;
            }
            let base = literal_base(&pattern.text);
            let target = normalize_lexically(&work_dir.join(&base));
            if self.is_path_allowed(&target)? {
                kept.push(pattern);
                continue;
            }
            warn!(
                pattern = %pattern,
                line = pattern.source_line,
                file = %pattern.origin.display(),
                "pattern outside allowed roots dropped"
            );
            skipped.push(SkippedRule::new(
                pattern.origin.clone(),
                pattern.source_line,
                pattern.to_string(),
                format!("{} is outside every allowed root", target.display()),
            ));
        }

        Ok((kept, skipped))
    }
}

/// Absolute or parent-relative patterns need a sandbox check.
fn leaves_work_dir(pattern: &str) -> bool {
    let pattern = pattern.trim_start_matches("./");
    pattern.starts_with('/') || pattern.starts_with("../") || pattern == ".."
}

/// Leading path components up to the first one containing a glob
/// character. `/` when the very first component is a glob.
pub fn literal_base(pattern: &str) -> PathBuf {
    let absolute = pattern.starts_with('/');
    let mut base = if absolute { PathBuf::from("/") } else { PathBuf::new() };
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if segment.contains(GLOB_CHARS) {
            break;
        }
        base.push(segment);
    }
    base
}
