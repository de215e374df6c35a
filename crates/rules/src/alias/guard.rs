//! Guard for single rules added interactively.
//!
//! Rejects rules that look like filesystem escapes before they are written
//! to a rule file.

use crate::parser::split_directive;

/// Most `../` segments an interactive rule may carry.
const MAX_PARENT_SEGMENTS: usize = 2;

const SYSTEM_DIRS: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/var", "/sys", "/proc", "/dev", "/boot", "/root", "/System",
    "/Library",
];

const SENSITIVE_NAMES: &[&str] = &[".ssh", ".aws", ".gnupg", ".kube", ".netrc", ".npmrc", ".pypirc"];

const SENSITIVE_SUFFIXES: &[&str] = &[".docker/config.json"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleGuardError {
    #[error("rule is empty")]
    Empty,

    #[error("rule climbs {count} directories up (at most 2 allowed)")]
    TooManyParentSegments { count: usize },

    #[error("rule {0:?} would match the whole filesystem")]
    TooBroad(String),

    #[error("rule targets system directory {0}")]
    SystemDirectory(String),

    #[error("rule targets sensitive path {0}")]
    SensitivePath(String),
}

/// Validate one rule before it is appended to a rule file.
pub fn check_interactive_rule(rule: &str) -> Result<(), RuleGuardError> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(RuleGuardError::Empty);
    }
    if matches!(rule, "**" | "/**" | "!**") {
        return Err(RuleGuardError::TooBroad(rule.to_string()));
    }

    let body = rule.trim_start_matches('!').trim_start();
    let body = split_directive(body).map(|(b, _)| b).unwrap_or(body);
    if matches!(body, "**" | "/**") {
        return Err(RuleGuardError::TooBroad(rule.to_string()));
    }

    let normalized = body.replace('\\', "/");

    let count = normalized.split('/').filter(|s| *s == "..").count();
    if count > MAX_PARENT_SEGMENTS {
        return Err(RuleGuardError::TooManyParentSegments { count });
    }

    if let Some(dir) = system_dir(&normalized) {
        return Err(RuleGuardError::SystemDirectory(dir.to_string()));
    }

    if let Some(name) = normalized
        .split('/')
        .find(|segment| SENSITIVE_NAMES.contains(segment))
    {
        return Err(RuleGuardError::SensitivePath(name.to_string()));
    }
    if let Some(suffix) = SENSITIVE_SUFFIXES.iter().find(|s| normalized.contains(*s)) {
        return Err(RuleGuardError::SensitivePath(suffix.to_string()));
    }

    Ok(())
}

fn system_dir(path: &str) -> Option<&'static str> {
    let under = |dir: &str| {
        path == dir
            || path
                .strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
    };
    if let Some(dir) = SYSTEM_DIRS.iter().find(|d| under(d)) {
        return Some(dir);
    }
    let lower = path.to_ascii_lowercase();
    if lower == "c:/windows" || lower.starts_with("c:/windows/") {
        return Some("C:\\Windows");
    }
    None
}
