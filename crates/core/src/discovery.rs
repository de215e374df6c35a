//! Filesystem-backed workspace catalog.
//!
//! Scans the configured search paths (recursively, via `walkdir`) for
//! projects: directories holding a `.git` entry or a `ctxbundle.yml`.
//! A descriptor with `ecosystem: true` marks an ecosystem; projects below it
//! record it as their parent ecosystem. Git worktrees live under
//! `<project>/.worktrees/<name>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths::{canonical_or_normalized, dir_name, expand_home};
use crate::project::{ProjectLoader, YamlProjectLoader, DESCRIPTOR_FILE};
use crate::workspace::{innermost_containing, WorkspaceInfo, WorkspaceLookup};

/// Directory under a project or ecosystem that holds its git worktrees.
pub const WORKTREES_DIR: &str = ".worktrees";

/// Directory names never scanned for nested projects.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "vendor", "dist", "build"];

/// A directory that looked like a project during the scan.
#[derive(Debug, Clone)]
struct Found {
    path: PathBuf,
    ecosystem: bool,
}

pub struct DirectoryCatalog {
    roots: Vec<PathBuf>,
    max_depth: usize,
    excluded: Vec<PathBuf>,
}

impl DirectoryCatalog {
    pub fn new(roots: Vec<PathBuf>, max_depth: usize) -> Self {
        Self {
            roots,
            max_depth,
            excluded: Vec::new(),
        }
    }

    /// Mark workspaces under these paths as excluded from the sandbox.
    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    fn scan(&self) -> Vec<Found> {
        let mut found: BTreeMap<PathBuf, Found> = BTreeMap::new();

        for root in &self.roots {
            if !root.is_dir() {
                debug!(path = %root.display(), "search path missing, skipping");
                continue;
            }
            // Worktree nesting adds up to two levels below a project.
            let walker = WalkDir::new(root)
                .follow_links(false)
                .max_depth(self.max_depth + 2)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || descend_into(e.path()));

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(error = %e, "walkdir error during discovery, skipping entry");
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                let dir = entry.path();
                let has_git = dir.join(".git").exists();
                let has_descriptor = dir.join(DESCRIPTOR_FILE).is_file();
                if !has_git && !has_descriptor {
                    continue;
                }
                let ecosystem = has_descriptor
                    && match YamlProjectLoader.load(dir) {
                        Ok(Some(d)) => d.ecosystem,
                        Ok(None) => false,
                        Err(e) => {
                            warn!(path = %dir.display(), error = %e, "unreadable project descriptor");
                            false
                        }
                    };
                let path = canonical_or_normalized(dir);
                found.insert(path.clone(), Found { path, ecosystem });
            }
        }

        found.into_values().collect()
    }

    fn build(&self, found: &[Found]) -> Vec<WorkspaceInfo> {
        let ecosystems: Vec<&Path> = found
            .iter()
            .filter(|f| f.ecosystem)
            .map(|f| f.path.as_path())
            .collect();

        let ecosystem_of = |dir: &Path| -> Option<PathBuf> {
            ecosystems
                .iter()
                .filter(|eco| dir != **eco && dir.starts_with(eco))
                .max_by_key(|eco| eco.components().count())
                .map(|eco| eco.to_path_buf())
        };

        let mut out = Vec::with_capacity(found.len());
        for f in found {
            let Some(name) = dir_name(&f.path).map(str::to_string) else {
                continue;
            };
            let mut info = match split_worktree(&f.path) {
                None => {
                    let mut info = WorkspaceInfo::project(name, &f.path);
                    info.parent_ecosystem_path = ecosystem_of(&f.path);
                    info
                }
                Some((owner, worktree, rest)) if rest.as_os_str().is_empty() => {
                    let mut info = WorkspaceInfo::project(name, &f.path).as_worktree(worktree, &owner);
                    info.parent_ecosystem_path = ecosystem_of(&owner);
                    info
                }
                Some((owner, worktree, rest)) => {
                    // Project checked out inside an ecosystem worktree.
                    WorkspaceInfo::project(name, &f.path)
                        .as_worktree(worktree, owner.join(&rest))
                        .in_ecosystem(owner)
                }
            };
            info.excluded = self.excluded.iter().any(|ex| f.path.starts_with(ex));
            out.push(info);
        }
        out
    }
}

/// Split `<owner>/.worktrees/<name>/<rest>` at the last worktrees segment.
fn split_worktree(path: &Path) -> Option<(PathBuf, String, PathBuf)> {
    let components: Vec<_> = path.components().collect();
    let idx = components
        .iter()
        .rposition(|c| c.as_os_str() == WORKTREES_DIR)?;
    let worktree = components.get(idx + 1)?.as_os_str().to_str()?.to_string();
    let owner: PathBuf = components[..idx].iter().collect();
    let rest: PathBuf = components[idx + 2..].iter().collect();
    Some((owner, worktree, rest))
}

fn descend_into(path: &Path) -> bool {
    match dir_name(path) {
        Some(WORKTREES_DIR) => true,
        Some(name) if name.starts_with('.') => false,
        Some(name) => !SKIPPED_DIRS.contains(&name),
        None => false,
    }
}

impl WorkspaceLookup for DirectoryCatalog {
    fn resolve(&self, name_or_path: &str) -> Result<Option<WorkspaceInfo>> {
        let all = self.all()?;
        let looks_like_path =
            name_or_path.contains('/') || name_or_path.starts_with('.') || name_or_path.starts_with('~');
        if looks_like_path {
            let path = canonical_or_normalized(&expand_home(name_or_path));
            return Ok(innermost_containing(&all, &path).cloned());
        }
        let mut matches: Vec<&WorkspaceInfo> = all.iter().filter(|ws| ws.name == name_or_path).collect();
        matches.sort_by_key(|ws| (ws.is_worktree, ws.path.clone()));
        Ok(matches.first().map(|ws| (*ws).clone()))
    }

    fn all(&self) -> Result<Vec<WorkspaceInfo>> {
        let found = self.scan();
        let workspaces = self.build(&found);
        debug!(count = workspaces.len(), "workspace discovery complete");
        Ok(workspaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mk_project(path: &Path) {
        fs::create_dir_all(path.join(".git")).unwrap();
    }

    fn mk_worktree(path: &Path) {
        fs::create_dir_all(path).unwrap();
        fs::write(path.join(".git"), "gitdir: elsewhere\n").unwrap();
    }

    #[test]
    fn discovers_ecosystem_projects_and_worktrees() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();

        let team = root.join("team");
        fs::create_dir_all(&team).unwrap();
        fs::write(team.join(DESCRIPTOR_FILE), "ecosystem: true\n").unwrap();
        mk_project(&team.join("api"));
        mk_worktree(&team.join("api/.worktrees/feature-x"));
        mk_project(&root.join("solo"));

        let catalog = DirectoryCatalog::new(vec![root.clone()], 3);
        let all = catalog.all().unwrap();

        let api = all.iter().find(|w| w.name == "api").unwrap();
        assert_eq!(api.ecosystem_name(), Some("team"));
        assert!(!api.is_worktree);

        let wt = all.iter().find(|w| w.name == "feature-x").unwrap();
        assert!(wt.is_worktree);
        assert_eq!(wt.parent_name(), Some("api"));
        assert_eq!(wt.ecosystem_name(), Some("team"));

        let solo = all.iter().find(|w| w.name == "solo").unwrap();
        assert!(solo.parent_ecosystem_path.is_none());
    }

    #[test]
    fn project_inside_ecosystem_worktree_is_worktree_nested() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let team = root.join("team");
        fs::create_dir_all(&team).unwrap();
        fs::write(team.join(DESCRIPTOR_FILE), "ecosystem: true\n").unwrap();
        mk_project(&team.join("api"));
        mk_worktree(&team.join(".worktrees/sprint/api"));

        let all = DirectoryCatalog::new(vec![root], 3).all().unwrap();
        let nested = all
            .iter()
            .find(|w| w.name == "api" && w.is_worktree)
            .unwrap();
        assert_eq!(nested.worktree_name.as_deref(), Some("sprint"));
        assert_eq!(nested.ecosystem_name(), Some("team"));
    }

    #[test]
    fn resolve_by_path_and_exclusion() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        mk_project(&root.join("app"));
        mk_project(&root.join("secret"));

        let catalog = DirectoryCatalog::new(vec![root.clone()], 2).with_excluded(vec![root.join("secret")]);
        let app = catalog
            .resolve(root.join("app/src").to_str().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(app.name, "app");
        let secret = catalog.resolve("secret").unwrap().unwrap();
        assert!(secret.excluded);
    }
}
