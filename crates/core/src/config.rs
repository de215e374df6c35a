use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Name of the per-user configuration directory and of the tool itself.
pub const APP_NAME: &str = "ctxbundle";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_paths(key: &str) -> Option<Vec<PathBuf>> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(|v| env::split_paths(&v).collect())
}

fn env_usize(key: &str) -> Option<usize> {
    env_opt(key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

/// Resolution settings shared by the engine and the CLI.
///
/// Values come from an optional TOML file (`<config_dir>/config.toml`)
/// and are then overridden by `CTXBUNDLE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots scanned for workspaces (projects, ecosystems, worktrees).
    pub search_paths: Vec<PathBuf>,
    /// Extra locations resolution may read outside discovered workspaces.
    pub allowed_paths: Vec<PathBuf>,
    /// Locations resolution must never read. Checked before everything else.
    pub denied_paths: Vec<PathBuf>,
    /// Directory holding `config.toml`; always readable by resolution.
    pub config_dir: PathBuf,
    /// Root for remote repository checkouts.
    pub cache_dir: PathBuf,
    /// Worker threads used for `@grep:` content filtering.
    pub grep_workers: usize,
    /// Maximum directory depth scanned below each search path.
    pub discovery_depth: usize,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_NAME)
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_NAME)
}

fn default_search_paths() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| vec![home.join("code")])
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_paths: default_search_paths(),
            allowed_paths: Vec::new(),
            denied_paths: Vec::new(),
            config_dir: default_config_dir(),
            cache_dir: default_cache_dir(),
            grep_workers: 4,
            discovery_depth: 3,
        }
    }
}

impl Config {
    /// Build config from the default file location and the environment
    /// (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self> {
        let path = env_opt("CTXBUNDLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_config_dir().join("config.toml"));
        Self::load(&path)
    }

    /// Load the TOML file at `path` (defaults when missing), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!(path = %path.display(), "loading config file");
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(paths) = env_paths("CTXBUNDLE_SEARCH_PATHS") {
            self.search_paths = paths;
        }
        if let Some(paths) = env_paths("CTXBUNDLE_ALLOW") {
            self.allowed_paths = paths;
        }
        if let Some(paths) = env_paths("CTXBUNDLE_DENY") {
            self.denied_paths = paths;
        }
        if let Some(dir) = env_opt("CTXBUNDLE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(workers) = env_usize("CTXBUNDLE_GREP_WORKERS") {
            self.grep_workers = workers.max(1);
        }
        if let Some(depth) = env_usize("CTXBUNDLE_DISCOVERY_DEPTH") {
            self.discovery_depth = depth;
        }
    }

    /// Directory for shallow checkouts made by the repository fetcher.
    pub fn repos_dir(&self) -> PathBuf {
        self.cache_dir.join("repos")
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  search_paths:  {:?}", self.search_paths);
        tracing::info!("  allowed_paths: {:?}", self.allowed_paths);
        tracing::info!("  denied_paths:  {:?}", self.denied_paths);
        tracing::info!("  config_dir:    {}", self.config_dir.display());
        tracing::info!("  cache_dir:     {}", self.cache_dir.display());
        tracing::info!("  grep_workers:  {}", self.grep_workers);
    }
}
