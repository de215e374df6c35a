//! Remote repository checkouts for `git::` imports and URL patterns.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// Git URL + ref → local checkout path.
pub trait RepoFetcher: Send + Sync {
    /// Return a local checkout of `url` at `reference` (default branch when `None`).
    fn ensure(&self, url: &str, reference: Option<&str>) -> Result<PathBuf>;
}

/// Shallow clones via the `git` CLI, cached under `<repos_dir>/<sha256(url)>/<ref>`.
pub struct GitCliFetcher {
    repos_dir: PathBuf,
}

impl GitCliFetcher {
    pub fn new(repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            repos_dir: repos_dir.into(),
        }
    }

    /// Where a checkout of `url@reference` lives (whether or not it exists yet).
    pub fn checkout_dir(&self, url: &str, reference: Option<&str>) -> PathBuf {
        let digest = Sha256::digest(normalize_url(url).as_bytes());
        let key = format!("{:x}", digest);
        let reference = reference.unwrap_or("HEAD").replace(['/', '\\'], "_");
        self.repos_dir.join(&key[..16]).join(reference)
    }

    fn run(&self, args: &[&str], dir: &Path) -> Result<Output> {
        debug!(args = ?args, dir = %dir.display(), "Running git command");
        let output = Command::new("git").args(args).current_dir(dir).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(args = ?args, stderr = %stderr, "Git command failed");
            return Err(CoreError::Git(stderr.trim().to_string()));
        }
        Ok(output)
    }
}

impl RepoFetcher for GitCliFetcher {
    fn ensure(&self, url: &str, reference: Option<&str>) -> Result<PathBuf> {
        if url.trim().is_empty() {
            return Err(CoreError::InvalidRepository(url.to_string()));
        }
        let target = self.checkout_dir(url, reference);
        if target.join(".git").exists() {
            debug!(url, path = %target.display(), "using cached checkout");
            return Ok(target);
        }

        let parent = target
            .parent()
            .ok_or_else(|| CoreError::InvalidRepository(url.to_string()))?;
        std::fs::create_dir_all(parent)?;

        let target_str = target.to_string_lossy().to_string();
        let mut args = vec!["clone", "--depth", "1", "--quiet"];
        if let Some(reference) = reference {
            args.push("--branch");
            args.push(reference);
        }
        args.push(url);
        args.push(&target_str);
        self.run(&args, parent)?;

        info!(url, reference = reference.unwrap_or("HEAD"), path = %target.display(), "cloned repository");
        Ok(target)
    }
}

/// Lowercase host, strip trailing `.git` and `/`, so equivalent URLs share a cache entry.
fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed.to_lowercase()
}
