//! Workspace catalog types and the lookup interface consumed by alias
//! resolution and the sandbox.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::dir_name;

/// One discovered project, ecosystem or worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub name: String,
    pub path: PathBuf,
    /// For worktrees: the project the worktree belongs to.
    pub parent_path: Option<PathBuf>,
    /// Ecosystem directory containing the project, if any.
    pub parent_ecosystem_path: Option<PathBuf>,
    /// True for worktrees and for projects nested inside an ecosystem worktree.
    pub is_worktree: bool,
    pub worktree_name: Option<String>,
    /// Workspaces excluded from the sandbox's allowed roots.
    #[serde(default)]
    pub excluded: bool,
}

impl WorkspaceInfo {
    /// A plain top-level project.
    pub fn project(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parent_path: None,
            parent_ecosystem_path: None,
            is_worktree: false,
            worktree_name: None,
            excluded: false,
        }
    }

    pub fn in_ecosystem(mut self, ecosystem: impl Into<PathBuf>) -> Self {
        self.parent_ecosystem_path = Some(ecosystem.into());
        self
    }

    pub fn as_worktree(mut self, worktree: impl Into<String>, parent: impl Into<PathBuf>) -> Self {
        self.is_worktree = true;
        self.worktree_name = Some(worktree.into());
        self.parent_path = Some(parent.into());
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Directory name of the parent ecosystem.
    pub fn ecosystem_name(&self) -> Option<&str> {
        self.parent_ecosystem_path.as_deref().and_then(dir_name)
    }

    /// Directory name of the parent project (worktrees only).
    pub fn parent_name(&self) -> Option<&str> {
        self.parent_path.as_deref().and_then(dir_name)
    }
}

/// Name/path → workspace metadata.
pub trait WorkspaceLookup: Send + Sync {
    /// Find a workspace by exact name, or the innermost workspace containing a path.
    fn resolve(&self, name_or_path: &str) -> Result<Option<WorkspaceInfo>>;

    /// Every known workspace.
    fn all(&self) -> Result<Vec<WorkspaceInfo>>;
}

/// Innermost workspace whose root contains `path`.
pub fn innermost_containing<'a>(
    workspaces: &'a [WorkspaceInfo],
    path: &Path,
) -> Option<&'a WorkspaceInfo> {
    workspaces
        .iter()
        .filter(|ws| path.starts_with(&ws.path))
        .max_by_key(|ws| ws.path.components().count())
}

/// In-memory catalog, used for tests and for callers that discover
/// workspaces themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    workspaces: Vec<WorkspaceInfo>,
}

impl StaticCatalog {
    pub fn new(workspaces: Vec<WorkspaceInfo>) -> Self {
        Self { workspaces }
    }

    pub fn push(&mut self, workspace: WorkspaceInfo) {
        self.workspaces.push(workspace);
    }
}

impl WorkspaceLookup for StaticCatalog {
    fn resolve(&self, name_or_path: &str) -> Result<Option<WorkspaceInfo>> {
        if name_or_path.contains('/') {
            return Ok(innermost_containing(&self.workspaces, Path::new(name_or_path)).cloned());
        }
        Ok(self
            .workspaces
            .iter()
            .find(|ws| ws.name == name_or_path)
            .cloned())
    }

    fn all(&self) -> Result<Vec<WorkspaceInfo>> {
        Ok(self.workspaces.clone())
    }
}
