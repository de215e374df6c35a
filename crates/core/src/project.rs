//! Project descriptor (`ctxbundle.yml`) loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// File name of the per-project descriptor.
pub const DESCRIPTOR_FILE: &str = "ctxbundle.yml";

/// Per-project settings read from `ctxbundle.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    /// Marks a directory whose child projects form an ecosystem.
    #[serde(default)]
    pub ecosystem: bool,
    #[serde(default)]
    pub context: ContextSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Rule file used when another project writes `@default: <this project>`.
    /// Relative to the project directory.
    #[serde(default)]
    pub default_rules: Option<PathBuf>,
}

impl ProjectDescriptor {
    /// Absolute path of the configured default rules, if any.
    pub fn default_rules_path(&self, project_dir: &Path) -> Option<PathBuf> {
        self.context
            .default_rules
            .as_ref()
            .map(|p| if p.is_absolute() { p.clone() } else { project_dir.join(p) })
    }
}

/// Loads a project's descriptor given its directory.
pub trait ProjectLoader: Send + Sync {
    /// `Ok(None)` when the directory has no descriptor.
    fn load(&self, project_dir: &Path) -> Result<Option<ProjectDescriptor>>;
}

/// Reads `<dir>/ctxbundle.yml` with `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlProjectLoader;

impl ProjectLoader for YamlProjectLoader {
    fn load(&self, project_dir: &Path) -> Result<Option<ProjectDescriptor>> {
        let path = project_dir.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no project descriptor");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let descriptor: ProjectDescriptor = serde_yaml::from_str(&contents)?;
        Ok(Some(descriptor))
    }
}
