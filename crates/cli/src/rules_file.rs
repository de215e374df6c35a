//! Editing rule files in place.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

const SEPARATOR: &str = "---";

/// Outcome of [`add_rule`].
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Insert `rule` into `text`: at the end of the hot section (before the
/// first `---`), or at the end of the cold section, creating the separator
/// when needed.
pub fn insert_rule(text: &str, rule: &str, cold: bool) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    let separator = lines.iter().position(|l| l.trim() == SEPARATOR);

    match (cold, separator) {
        (false, Some(at)) => {
            let mut insert_at = at;
            while insert_at > 0 && lines[insert_at - 1].trim().is_empty() {
                insert_at -= 1;
            }
            lines.insert(insert_at, rule);
        }
        (false, None) | (true, Some(_)) => lines.push(rule),
        (true, None) => {
            lines.push(SEPARATOR);
            lines.push(rule);
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Add `rule` to the file at `path`, replacing the whole file. A rule
/// already present in the target tier is left alone.
pub fn add_rule(path: &Path, rule: &str, cold: bool) -> Result<AddOutcome> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let separator = text.lines().position(|l| l.trim() == SEPARATOR);
    let present = text.lines().enumerate().any(|(i, line)| {
        let in_cold = separator.is_some_and(|s| i > s);
        line.trim() == rule.trim() && in_cold == cold
    });
    if present {
        debug!(path = %path.display(), rule, "rule already present");
        return Ok(AddOutcome::AlreadyPresent);
    }

    let updated = insert_rule(&text, rule.trim(), cold);
    let tmp = path.with_extension("rules.tmp");
    fs::write(&tmp, updated).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    debug!(path = %path.display(), rule, cold, "rule added");
    Ok(AddOutcome::Added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_rule_goes_before_separator() {
        let text = "*.rs\n\n---\ndocs/**\n";
        assert_eq!(insert_rule(text, "*.toml", false), "*.rs\n*.toml\n\n---\ndocs/**\n");
    }

    #[test]
    fn cold_rule_creates_separator() {
        assert_eq!(insert_rule("*.rs\n", "docs/**", true), "*.rs\n---\ndocs/**\n");
        assert_eq!(insert_rule("*.rs\n---\na\n", "b", true), "*.rs\n---\na\nb\n");
    }

    #[test]
    fn add_rule_creates_and_deduplicates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("context.rules");

        assert_eq!(add_rule(&path, "*.go", false).unwrap(), AddOutcome::Added);
        assert_eq!(add_rule(&path, "*.go", false).unwrap(), AddOutcome::AlreadyPresent);
        assert_eq!(add_rule(&path, "*.go", true).unwrap(), AddOutcome::Added);
        assert_eq!(fs::read_to_string(&path).unwrap(), "*.go\n---\n*.go\n");
        assert!(!path.with_extension("rules.tmp").exists());
    }
}
