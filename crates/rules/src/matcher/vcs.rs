//! Git ignore status, computed once per repository root.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

/// Tracked and ignored paths of one repository, as reported by
/// `git ls-files`. Tracked paths are never treated as ignored.
#[derive(Debug, Default)]
pub struct RepoIgnores {
    root: PathBuf,
    tracked: HashSet<PathBuf>,
    /// Every directory containing a tracked file.
    tracked_dirs: HashSet<PathBuf>,
    ignored_files: HashSet<PathBuf>,
    ignored_dirs: HashSet<PathBuf>,
}

impl RepoIgnores {
    fn load(root: &Path) -> Self {
        let mut out = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };

        match ls_files(root, &[]) {
            Ok(tracked) => {
                for rel in tracked {
                    let path = root.join(rel.trim_end_matches('/'));
                    for ancestor in path.ancestors().skip(1) {
                        if ancestor == root || !out.tracked_dirs.insert(ancestor.to_path_buf()) {
                            break;
                        }
                    }
                    out.tracked.insert(path);
                }
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "git ls-files failed, no ignore rules applied");
                return out;
            }
        }

        match ls_files(root, &["--others", "--ignored", "--exclude-standard", "--directory"]) {
            Ok(ignored) => {
                for rel in ignored {
                    if let Some(dir) = rel.strip_suffix('/') {
                        out.ignored_dirs.insert(root.join(dir));
                    } else {
                        out.ignored_files.insert(root.join(rel));
                    }
                }
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "git ignore listing failed");
            }
        }

        debug!(
            root = %root.display(),
            tracked = out.tracked.len(),
            ignored_files = out.ignored_files.len(),
            ignored_dirs = out.ignored_dirs.len(),
            "repository ignore set loaded"
        );
        out
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` is ignored. Directories holding tracked files are
    /// never ignored.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if is_dir {
            if self.tracked_dirs.contains(path) {
                return false;
            }
        } else if self.tracked.contains(path) {
            return false;
        }
        if self.ignored_files.contains(path) || self.ignored_dirs.contains(path) {
            return true;
        }
        path.ancestors()
            .skip(1)
            .take_while(|a| a.starts_with(&self.root) && *a != self.root)
            .any(|a| self.ignored_dirs.contains(a))
    }
}

fn ls_files(root: &Path, extra: &[&str]) -> Result<Vec<String>, String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["ls-files", "-z"])
        .args(extra)
        .output()
        .map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .split('\0')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Per-repository ignore sets, populated lazily and never invalidated.
///
/// Callers construct one cache and share it across resolutions.
#[derive(Debug, Default)]
pub struct IgnoreCache {
    repos: RwLock<HashMap<PathBuf, Arc<RepoIgnores>>>,
    /// Directory → enclosing repository root.
    roots: RwLock<HashMap<PathBuf, Option<PathBuf>>>,
}

impl IgnoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost enclosing repository root of `dir`, if any.
    pub fn repo_root(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(cached) = self.roots.read().unwrap_or_else(|e| e.into_inner()).get(dir) {
            return cached.clone();
        }
        let root = dir
            .ancestors()
            .find(|a| a.join(".git").exists())
            .map(Path::to_path_buf);
        self.roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(dir.to_path_buf(), root.clone());
        root
    }

    /// Ignore set of the repository rooted at `root`, loading it once.
    pub fn repo(&self, root: &Path) -> Arc<RepoIgnores> {
        if let Some(cached) = self.repos.read().unwrap_or_else(|e| e.into_inner()).get(root) {
            return Arc::clone(cached);
        }
        let mut guard = self.repos.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            guard
                .entry(root.to_path_buf())
                .or_insert_with(|| Arc::new(RepoIgnores::load(root))),
        )
    }

    /// Whether `path` is ignored by its enclosing repository.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let dir = if is_dir { path } else { path.parent().unwrap_or(path) };
        match self.repo_root(dir) {
            Some(root) if root != path => self.repo(&root).is_ignored(path, is_dir),
            _ => false,
        }
    }
}
