//! [`ContextResolver`]: rule file in, classified paths out.
//!
//! One resolution runs expand → sandbox filter → walk both tiers →
//! subtract cold from hot. The resolver owns the long-lived memo caches
//! (catalog snapshot, per-repository ignore sets) so repeated resolutions
//! share them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use ctxbundle_core::paths::canonical_or_normalized;
use ctxbundle_core::{
    Config, DirectoryCatalog, GitCliFetcher, ProjectLoader, RepoFetcher, WorkspaceLookup,
    YamlProjectLoader,
};

use crate::alias::{AliasResolver, Sandbox};
use crate::attribution::{attribute, AttributionReport};
use crate::error::{Result, SkippedRule};
use crate::expander::RuleExpander;
use crate::matcher::{IgnoreCache, PreparedTier, WalkOptions};
use crate::model::{CacheControl, ClassifiedPath, PathStatus, RulePattern, RuleSet, Tier};

/// Outcome of one resolution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedContext {
    /// Hot-tier files not also in cold, sorted.
    pub hot: Vec<PathBuf>,
    /// Cold-tier files, sorted.
    pub cold: Vec<PathBuf>,
    /// Every walked path with its final status, sorted by path.
    pub classified: Vec<ClassifiedPath>,
    pub views: Vec<String>,
    pub cache: CacheControl,
    pub skipped: Vec<SkippedRule>,
}

impl ResolvedContext {
    pub fn tier(&self, tier: Tier) -> &[PathBuf] {
        match tier {
            Tier::Hot => &self.hot,
            Tier::Cold => &self.cold,
        }
    }

    pub fn status(&self, path: &Path) -> Option<PathStatus> {
        self.classified
            .binary_search_by(|c| c.path.as_path().cmp(path))
            .ok()
            .map(|i| self.classified[i].status)
    }
}

/// Resolves rule files relative to one working directory.
pub struct ContextResolver {
    work_dir: PathBuf,
    aliases: Arc<AliasResolver>,
    sandbox: Sandbox,
    fetcher: Arc<dyn RepoFetcher>,
    projects: Arc<dyn ProjectLoader>,
    ignores: Arc<IgnoreCache>,
    options: WalkOptions,
}

impl ContextResolver {
    pub fn new(
        work_dir: impl AsRef<Path>,
        catalog: Arc<dyn WorkspaceLookup>,
        fetcher: Arc<dyn RepoFetcher>,
        projects: Arc<dyn ProjectLoader>,
    ) -> Self {
        let work_dir = canonical_or_normalized(work_dir.as_ref());
        let aliases = Arc::new(AliasResolver::new(catalog, work_dir.clone()));
        let sandbox = Sandbox::new(Arc::clone(&aliases));
        Self {
            work_dir,
            aliases,
            sandbox,
            fetcher,
            projects,
            ignores: Arc::new(IgnoreCache::new()),
            options: WalkOptions::default(),
        }
    }

    /// Resolver wired to the reference collaborators: a directory-scanning
    /// catalog, `git` checkouts under the cache dir, and `ctxbundle.yml`
    /// descriptors.
    pub fn from_config(config: &Config, work_dir: impl AsRef<Path>) -> Self {
        let catalog = DirectoryCatalog::new(config.search_paths.clone(), config.discovery_depth)
            .with_excluded(config.denied_paths.clone());
        let repos_dir = config.repos_dir();

        let mut resolver = Self::new(
            work_dir,
            Arc::new(catalog),
            Arc::new(GitCliFetcher::new(repos_dir.clone())),
            Arc::new(YamlProjectLoader),
        )
        .allow(&repos_dir)
        .with_config_dir(&config.config_dir)
        .with_options(WalkOptions {
            grep_workers: config.grep_workers,
        });
        for path in &config.allowed_paths {
            resolver = resolver.allow(path);
        }
        for path in &config.denied_paths {
            resolver = resolver.deny(path);
        }
        resolver
    }

    pub fn allow(mut self, path: impl AsRef<Path>) -> Self {
        self.sandbox = self.sandbox.allow(path);
        self
    }

    pub fn deny(mut self, path: impl AsRef<Path>) -> Self {
        self.sandbox = self.sandbox.deny(path);
        self
    }

    pub fn with_config_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.sandbox = self.sandbox.with_config_dir(path);
        self
    }

    /// Share an ignore cache with other resolvers.
    pub fn with_ignores(mut self, ignores: Arc<IgnoreCache>) -> Self {
        self.ignores = ignores;
        self
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    fn rules_path(&self, rules_path: &Path) -> PathBuf {
        if rules_path.is_absolute() {
            rules_path.to_path_buf()
        } else {
            self.work_dir.join(rules_path)
        }
    }

    /// Expand `rules_path` and drop every pattern the sandbox rejects.
    pub fn load_rules(&self, rules_path: impl AsRef<Path>) -> Result<RuleSet> {
        let rules_path = self.rules_path(rules_path.as_ref());
        let expander = RuleExpander::new(
            &self.aliases,
            &self.sandbox,
            self.fetcher.as_ref(),
            self.projects.as_ref(),
        );
        let mut set = expander.expand_file(&rules_path, &self.work_dir)?;

        let (hot, hot_skipped) = self
            .sandbox
            .filter_patterns(std::mem::take(&mut set.hot), &self.work_dir)?;
        let (cold, cold_skipped) = self
            .sandbox
            .filter_patterns(std::mem::take(&mut set.cold), &self.work_dir)?;
        set.hot = hot;
        set.cold = cold;
        set.skipped.extend(hot_skipped);
        set.skipped.extend(cold_skipped);

        debug!(
            rules = %rules_path.display(),
            hot = set.hot.len(),
            cold = set.cold.len(),
            skipped = set.skipped.len(),
            "rules loaded"
        );
        Ok(set)
    }

    fn prepare(&self, tier: Tier, patterns: Vec<RulePattern>) -> PreparedTier {
        PreparedTier::prepare(tier, patterns, &self.work_dir, &self.ignores, &self.options)
    }

    fn prepare_tiers(&self, set: &mut RuleSet) -> (PreparedTier, PreparedTier) {
        let hot = self.prepare(Tier::Hot, std::mem::take(&mut set.hot));
        let cold = self.prepare(Tier::Cold, std::mem::take(&mut set.cold));
        set.skipped.extend(hot.skipped.iter().cloned());
        set.skipped.extend(cold.skipped.iter().cloned());
        (hot, cold)
    }

    /// Resolve `rules_path` into hot and cold file lists.
    pub fn resolve(&self, rules_path: impl AsRef<Path>) -> Result<ResolvedContext> {
        let start = Instant::now();
        let mut set = self.load_rules(rules_path.as_ref())?;
        let (hot, cold) = self.prepare_tiers(&mut set);

        let cold_files = cold.included();
        let hot_files: Vec<PathBuf> = hot
            .included()
            .into_iter()
            .filter(|p| cold_files.binary_search(p).is_err())
            .collect();

        let classified = classify_all(&hot, &cold);

        info!(
            rules = %rules_path.as_ref().display(),
            hot = hot_files.len(),
            cold = cold_files.len(),
            walked = classified.len(),
            skipped = set.skipped.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "context resolved"
        );

        Ok(ResolvedContext {
            hot: hot_files,
            cold: cold_files,
            classified,
            views: set.views,
            cache: set.cache,
            skipped: set.skipped,
        })
    }

    /// Resolve `rules_path` and report which line decided each file.
    pub fn explain(&self, rules_path: impl AsRef<Path>) -> Result<AttributionReport> {
        let mut set = self.load_rules(rules_path.as_ref())?;
        let (hot, cold) = self.prepare_tiers(&mut set);
        let mut report = attribute(&hot, &cold);
        report.skipped = set.skipped;
        Ok(report)
    }
}

/// Cold inclusion beats hot inclusion; otherwise a cold verdict is kept
/// only when a cold rule actually matched.
fn merge_status(hot: Option<PathStatus>, cold: Option<PathStatus>) -> Option<PathStatus> {
    match (hot, cold) {
        (_, Some(PathStatus::IncludedCold)) => Some(PathStatus::IncludedCold),
        (Some(PathStatus::IncludedHot), _) => Some(PathStatus::IncludedHot),
        (Some(h), Some(c)) if c == PathStatus::ExcludedByRule && h == PathStatus::OmittedNoMatch => {
            Some(c)
        }
        (Some(h), _) => Some(h),
        (None, c) => c,
    }
}

fn classify_all(hot: &PreparedTier, cold: &PreparedTier) -> Vec<ClassifiedPath> {
    let mut statuses: BTreeMap<PathBuf, (Option<PathStatus>, Option<PathStatus>)> = BTreeMap::new();
    for prepared in [hot, cold] {
        for candidate in &prepared.candidates {
            let status = prepared.evaluate(candidate).status(prepared.tier);
            let entry = statuses.entry(candidate.path.clone()).or_default();
            match prepared.tier {
                Tier::Hot => entry.0 = Some(status),
                Tier::Cold => entry.1 = Some(status),
            }
        }
        for pruned in &prepared.pruned {
            let entry = statuses.entry(pruned.path.clone()).or_default();
            let slot = match prepared.tier {
                Tier::Hot => &mut entry.0,
                Tier::Cold => &mut entry.1,
            };
            slot.get_or_insert(PathStatus::ExcludedByRule);
        }
    }

    statuses
        .into_iter()
        .filter_map(|(path, (h, c))| merge_status(h, c).map(|status| ClassifiedPath { path, status }))
        .collect()
}
