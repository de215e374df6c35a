//! Which rule line decided each file.
//!
//! Attribution replays [`PreparedTier::evaluate`] over the walked
//! candidates of both tiers, so it always agrees with resolution. Lines
//! are effective lines: patterns pulled in by an import are credited to
//! the importing line of the top-level file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::error::SkippedRule;
use crate::matcher::{Candidate, Evaluation, PreparedTier};
use crate::model::{RulePattern, Tier};

/// Why a file ended up with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Attribution {
    Included { line: usize, tier: Tier },
    Excluded { line: usize, tier: Tier },
    /// The glob matched but the directive rejected the file. `won_by` is
    /// the line that decided instead, if any.
    Filtered {
        line: usize,
        tier: Tier,
        won_by: Option<usize>,
    },
    /// Included by `line`, but binary without an explicit opt-in.
    BinarySkipped { line: usize, tier: Tier },
    IgnoredByVcs,
    NoMatch,
}

impl Attribution {
    fn counts_as_match(&self) -> bool {
        !matches!(self, Self::NoMatch | Self::IgnoredByVcs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttribution {
    pub attribution: Attribution,
    /// Text of the deciding pattern.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredFile {
    pub path: PathBuf,
    pub won_by: Option<usize>,
}

/// Attribution for every walked file, plus per-line groupings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttributionReport {
    pub files: BTreeMap<PathBuf, FileAttribution>,
    pub included: BTreeMap<usize, Vec<PathBuf>>,
    /// Excluded files, and directories pruned by an exclusion.
    pub excluded: BTreeMap<usize, Vec<PathBuf>>,
    pub filtered: BTreeMap<usize, Vec<FilteredFile>>,
    /// Rules that contributed nothing during the run being explained.
    pub skipped: Vec<SkippedRule>,
}

impl AttributionReport {
    fn record(&mut self, path: PathBuf, file: FileAttribution) {
        match &file.attribution {
            Attribution::Included { line, .. } => {
                self.included.entry(*line).or_default().push(path.clone())
            }
            Attribution::Excluded { line, .. } => {
                self.excluded.entry(*line).or_default().push(path.clone())
            }
            Attribution::Filtered { line, won_by, .. } => {
                self.filtered.entry(*line).or_default().push(FilteredFile {
                    path: path.clone(),
                    won_by: *won_by,
                })
            }
            _ => {}
        }
        self.files.insert(path, file);
    }

    /// Lines that contributed anything, ascending.
    pub fn lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self
            .included
            .keys()
            .chain(self.excluded.keys())
            .chain(self.filtered.keys())
            .copied()
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }
}

fn deciding(tier: &PreparedTier, index: usize) -> (&RulePattern, usize) {
    let p = &tier.patterns[index];
    (p, p.effective_line)
}

/// Explain one candidate within one tier. `None` for directories.
fn explain(tier: &PreparedTier, candidate: &Candidate) -> Option<FileAttribution> {
    let pattern = |index: usize| deciding(tier, index);
    let text = |p: &RulePattern| Some(p.to_string());

    let file = match tier.evaluate(candidate) {
        Evaluation::Directory => return None,
        Evaluation::IgnoredByVcs => FileAttribution {
            attribution: Attribution::IgnoredByVcs,
            pattern: None,
        },
        Evaluation::Classified {
            classification,
            binary_skipped,
        } => {
            let winner = classification.winner.map(pattern);
            match (winner, classification.overriding_filter()) {
                (Some((p, line)), _) if classification.included => FileAttribution {
                    attribution: if binary_skipped {
                        Attribution::BinarySkipped {
                            line,
                            tier: tier.tier,
                        }
                    } else {
                        Attribution::Included {
                            line,
                            tier: tier.tier,
                        }
                    },
                    pattern: text(p),
                },
                (winner, Some(filtered)) => {
                    let (p, line) = pattern(filtered);
                    FileAttribution {
                        attribution: Attribution::Filtered {
                            line,
                            tier: tier.tier,
                            won_by: winner.map(|(_, l)| l),
                        },
                        pattern: text(p),
                    }
                }
                (Some((p, line)), None) => FileAttribution {
                    attribution: Attribution::Excluded {
                        line,
                        tier: tier.tier,
                    },
                    pattern: text(p),
                },
                (None, None) => FileAttribution {
                    attribution: Attribution::NoMatch,
                    pattern: None,
                },
            }
        }
    };
    Some(file)
}

/// Attribute every file walked by either tier. Cold inclusion wins over
/// hot; otherwise a cold-tier explanation is preferred when it matched.
pub fn attribute(hot: &PreparedTier, cold: &PreparedTier) -> AttributionReport {
    let mut paths: BTreeMap<&PathBuf, (Option<&Candidate>, Option<&Candidate>)> = BTreeMap::new();
    for c in &hot.candidates {
        paths.entry(&c.path).or_default().0 = Some(c);
    }
    for c in &cold.candidates {
        paths.entry(&c.path).or_default().1 = Some(c);
    }

    let mut report = AttributionReport::default();
    for (path, (in_hot, in_cold)) in paths {
        if path.symlink_metadata().is_err() {
            debug!(path = %path.display(), "file vanished, omitted from attribution");
            continue;
        }
        let hot_file = in_hot.and_then(|c| explain(hot, c));
        let cold_file = in_cold.and_then(|c| explain(cold, c));

        let chosen = match (hot_file, cold_file) {
            (_, Some(c)) if matches!(c.attribution, Attribution::Included { .. }) => Some(c),
            (Some(h), _) if matches!(h.attribution, Attribution::Included { .. }) => Some(h),
            (h, Some(c)) if c.attribution.counts_as_match() || h.is_none() => Some(c),
            (h, _) => h,
        };
        if let Some(file) = chosen {
            report.record(path.clone(), file);
        }
    }

    for (tier, prepared) in [(Tier::Hot, hot), (Tier::Cold, cold)] {
        for pruned in &prepared.pruned {
            let p = &prepared.patterns[pruned.pattern];
            if report.files.contains_key(&pruned.path) {
                continue;
            }
            report.record(
                pruned.path.clone(),
                FileAttribution {
                    attribution: Attribution::Excluded {
                        line: p.effective_line,
                        tier,
                    },
                    pattern: Some(p.to_string()),
                },
            );
        }
    }

    debug!(
        files = report.files.len(),
        lines = report.lines().len(),
        "attribution complete"
    );
    report
}
