//! Content directives: `@find:` (path substring) and `@grep:` (content
//! substring).
//!
//! `@grep:` is the only parallel step of resolution: candidate files are
//! searched on a fixed-size rayon pool whose workers feed a single
//! collector over a bounded channel.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::sync_channel;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::model::ContentDirective;

use super::MatchPath;

/// Answers whether a directive accepts a path.
pub trait DirectiveOracle {
    fn accepts(&self, directive: &ContentDirective, path: &MatchPath) -> bool;
}

/// One file and the `@grep:` queries it must be checked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepJob {
    pub path: PathBuf,
    pub queries: Vec<String>,
}

/// Directive answers for one tier: `@find:` is evaluated on demand,
/// `@grep:` answers are looked up from a precomputed hit table.
#[derive(Debug, Clone, Default)]
pub struct DirectiveFilter {
    grep_hits: HashMap<PathBuf, HashSet<String>>,
}

impl DirectiveFilter {
    pub fn new(grep_hits: HashMap<PathBuf, HashSet<String>>) -> Self {
        Self { grep_hits }
    }

    /// Run `jobs` on `workers` threads and keep the hits.
    pub fn from_jobs(jobs: Vec<GrepJob>, workers: usize) -> Self {
        Self::new(grep_files(jobs, workers))
    }
}

impl DirectiveOracle for DirectiveFilter {
    fn accepts(&self, directive: &ContentDirective, path: &MatchPath) -> bool {
        match directive {
            ContentDirective::Find(query) => path.display().contains(query.as_str()),
            ContentDirective::Grep(query) => self
                .grep_hits
                .get(&path.path)
                .is_some_and(|hits| hits.contains(query)),
        }
    }
}

/// Search every job's file for its queries. Unreadable files match
/// nothing. Result order is not meaningful.
pub fn grep_files(jobs: Vec<GrepJob>, workers: usize) -> HashMap<PathBuf, HashSet<String>> {
    if jobs.is_empty() {
        return HashMap::new();
    }
    let workers = workers.max(1);
    let total = jobs.len();
    let (tx, rx) = sync_channel::<(PathBuf, HashSet<String>)>(workers * 4);

    let producer = std::thread::spawn(move || {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ctxbundle-grep-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| {
                jobs.par_iter().for_each_with(tx, |tx, job| {
                    let _ = tx.send(search(job));
                });
            }),
            Err(e) => {
                warn!(error = %e, "failed to build grep pool, searching inline");
                for job in &jobs {
                    let _ = tx.send(search(job));
                }
            }
        }
    });

    let mut hits = HashMap::new();
    while let Ok((path, matched)) = rx.recv() {
        if !matched.is_empty() {
            hits.insert(path, matched);
        }
    }
    if producer.join().is_err() {
        warn!("grep worker panicked; results may be incomplete");
    }

    debug!(files = total, hits = hits.len(), workers, "grep filtering complete");
    hits
}

fn search(job: &GrepJob) -> (PathBuf, HashSet<String>) {
    let bytes = match fs::read(&job.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %job.path.display(), error = %e, "unreadable file treated as non-match");
            return (job.path.clone(), HashSet::new());
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let matched = job
        .queries
        .iter()
        .filter(|q| content.contains(q.as_str()))
        .cloned()
        .collect();
    (job.path.clone(), matched)
}
