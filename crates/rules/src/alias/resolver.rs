//! Alias → absolute path resolution with context-aware tie-breaking.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use ctxbundle_core::paths::canonical_or_normalized;
use ctxbundle_core::workspace::innermost_containing;
use ctxbundle_core::{WorkspaceInfo, WorkspaceLookup};

use super::{AliasError, WorkspaceAlias};

/// Resolves aliases against a workspace catalog.
///
/// The catalog is read at most once per resolver; later calls reuse the
/// snapshot. Construct one resolver per process (or per test) and share it.
pub struct AliasResolver {
    lookup: Arc<dyn WorkspaceLookup>,
    /// Directory the caller runs from; decides the preferred worktree group.
    caller_dir: PathBuf,
    snapshot: RwLock<Option<Arc<Vec<WorkspaceInfo>>>>,
}

impl AliasResolver {
    pub fn new(lookup: Arc<dyn WorkspaceLookup>, caller_dir: impl Into<PathBuf>) -> Self {
        Self {
            lookup,
            caller_dir: canonical_or_normalized(&caller_dir.into()),
            snapshot: RwLock::new(None),
        }
    }

    /// The memoized catalog snapshot.
    pub fn workspaces(&self) -> Result<Arc<Vec<WorkspaceInfo>>, AliasError> {
        if let Some(cached) = self
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            return Ok(Arc::clone(cached));
        }

        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let all = self
            .lookup
            .all()
            .map_err(|e| AliasError::Discovery(e.to_string()))?;
        debug!(count = all.len(), "workspace catalog loaded");
        let all = Arc::new(all);
        *guard = Some(Arc::clone(&all));
        Ok(all)
    }

    /// Workspace the caller is running inside, if any.
    pub fn caller(&self) -> Result<Option<WorkspaceInfo>, AliasError> {
        let all = self.workspaces()?;
        Ok(innermost_containing(&all, &self.caller_dir).cloned())
    }

    pub fn caller_dir(&self) -> &Path {
        &self.caller_dir
    }

    /// Resolve an alias string to the workspace's absolute path.
    pub fn resolve(&self, alias: &str) -> Result<PathBuf, AliasError> {
        let parsed = WorkspaceAlias::parse(alias)?;
        let workspace = self.resolve_alias(&parsed, alias)?;
        debug!(alias, path = %workspace.path.display(), "alias resolved");
        Ok(workspace.path)
    }

    fn resolve_alias(&self, alias: &WorkspaceAlias, raw: &str) -> Result<WorkspaceInfo, AliasError> {
        let all = self.workspaces()?;
        let mut sorted: Vec<&WorkspaceInfo> = all.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let found = match alias {
            WorkspaceAlias::Name(name) => {
                let caller = innermost_containing(&all, &self.caller_dir);
                pick_by_name(&sorted, name, caller)
            }
            WorkspaceAlias::Pair(first, second) => sorted
                .iter()
                .find(|ws| {
                    !ws.is_worktree && ws.name == *second && ws.ecosystem_name() == Some(first.as_str())
                })
                .or_else(|| {
                    sorted.iter().find(|ws| {
                        ws.is_worktree
                            && ws.worktree_name.as_deref() == Some(second.as_str())
                            && ws.parent_name() == Some(first.as_str())
                    })
                })
                .copied(),
            WorkspaceAlias::Triple(ecosystem, repo, worktree) => sorted
                .iter()
                .find(|ws| {
                    ws.is_worktree
                        && ws.worktree_name.as_deref() == Some(worktree.as_str())
                        && ws.parent_name() == Some(repo.as_str())
                        && ws.ecosystem_name() == Some(ecosystem.as_str())
                })
                .copied(),
        };

        found
            .cloned()
            .ok_or_else(|| AliasError::NotFound(raw.to_string()))
    }
}

/// Bare-name lookup: a sibling in the caller's worktree group first, then a
/// project that is not worktree-nested, then anything with that name.
fn pick_by_name<'a>(
    sorted: &[&'a WorkspaceInfo],
    name: &str,
    caller: Option<&WorkspaceInfo>,
) -> Option<&'a WorkspaceInfo> {
    let candidates: Vec<&WorkspaceInfo> = sorted.iter().copied().filter(|ws| ws.name == name).collect();

    if let Some(caller) = caller.filter(|c| c.is_worktree) {
        let sibling = candidates.iter().copied().find(|ws| {
            ws.is_worktree
                && ws.worktree_name == caller.worktree_name
                && ws.parent_ecosystem_path == caller.parent_ecosystem_path
        });
        if sibling.is_some() {
            return sibling;
        }
    }

    candidates
        .iter()
        .copied()
        .find(|ws| !ws.is_worktree)
        .or_else(|| candidates.first().copied())
}
