//! Plain-text rendering of resolutions and attribution reports.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use ctxbundle_rules::{AttributionReport, ResolvedContext, SkippedRule, Tier};

fn display(path: &Path, work_dir: &Path) -> String {
    path.strip_prefix(work_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn write_skipped(out: &mut impl Write, skipped: &[SkippedRule]) -> Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    writeln!(out, "skipped:")?;
    for s in skipped {
        writeln!(out, "  {}:{}: {}: {}", s.file.display(), s.line, s.text, s.reason)?;
    }
    Ok(())
}

/// One path per line for `tier`; skipped rules go to `err`.
pub fn write_tier(
    out: &mut impl Write,
    err: &mut impl Write,
    ctx: &ResolvedContext,
    tier: Tier,
    work_dir: &Path,
) -> Result<()> {
    for path in ctx.tier(tier) {
        writeln!(out, "{}", display(path, work_dir))?;
    }
    write_skipped(err, &ctx.skipped)
}

/// Attribution grouped by effective line.
pub fn write_report(out: &mut impl Write, report: &AttributionReport, work_dir: &Path) -> Result<()> {
    for line in report.lines() {
        writeln!(out, "line {}:", line)?;
        for path in report.included.get(&line).into_iter().flatten() {
            writeln!(out, "  + {}", display(path, work_dir))?;
        }
        for path in report.excluded.get(&line).into_iter().flatten() {
            writeln!(out, "  - {}", display(path, work_dir))?;
        }
        for file in report.filtered.get(&line).into_iter().flatten() {
            match file.won_by {
                Some(won_by) => writeln!(
                    out,
                    "  ~ {} (filtered, line {} decided)",
                    display(&file.path, work_dir),
                    won_by
                )?,
                None => writeln!(out, "  ~ {} (filtered)", display(&file.path, work_dir))?,
            }
        }
    }
    write_skipped(out, &report.skipped)
}
