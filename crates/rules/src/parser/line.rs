//! Single-line classification.

use crate::model::{ContentDirective, ImportKind, ImportReference};

use super::braces::expand_braces;
use super::directive::{parse_duration, parse_standalone, split_directive};
use super::remote::{is_remote, parse_remote};
use super::Instruction;

/// Why a line produced no instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Recoverable: the line is recorded as skipped.
    Skip(String),
    /// `@expire-time` with a bad value; aborts resolution.
    InvalidDuration { value: String, reason: String },
}

fn skip(reason: impl Into<String>) -> LineError {
    LineError::Skip(reason.into())
}

const ALIAS_PREFIXES: &[&str] = &["@alias:", "@a:"];
const VIEW_PREFIXES: &[&str] = &["@view:", "@v:"];
const GIT_PREFIX: &str = "git::";

/// Classify one physical line. Blank lines and `#` comments yield no
/// instructions.
pub fn parse_line(raw: &str) -> Result<Vec<Instruction>, LineError> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Vec::new());
    }
    if line == "---" {
        return Ok(vec![Instruction::Separator]);
    }
    if let Some(standalone) = parse_standalone(line) {
        return standalone
            .map(|d| vec![Instruction::DefaultDirective(d)])
            .map_err(LineError::Skip);
    }

    let (exclude, line) = match line.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };
    if line.is_empty() {
        return Err(skip("empty exclusion"));
    }

    if let Some(instruction) = parse_cache_directive(line)? {
        if exclude {
            return Err(skip("exclusion is not valid on directives"));
        }
        return Ok(vec![instruction]);
    }

    if let Some(value) = strip_any(line, VIEW_PREFIXES) {
        if exclude {
            return Err(skip("exclusion is not valid on directives"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(skip("empty @view path"));
        }
        return Ok(vec![Instruction::View(value.to_string())]);
    }

    let (body, directive) = split_directive(line).map_err(LineError::Skip)?;
    if exclude && directive.is_some() {
        return Err(skip("directive not supported on exclusions"));
    }

    if let Some(value) = body.strip_prefix("@default:") {
        if exclude {
            return Err(skip("exclusion is not valid on @default"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(skip("empty @default path"));
        }
        return Ok(vec![Instruction::Import(ImportReference {
            kind: ImportKind::ProjectDefault,
            identifier: value.to_string(),
            ruleset: None,
            reference: None,
            source_line: 0,
            directive,
        })]);
    }

    if let Some(value) = strip_any(body, ALIAS_PREFIXES) {
        return parse_alias(value.trim(), exclude, directive);
    }

    if body.starts_with(GIT_PREFIX) {
        if exclude {
            return Err(skip("exclusion is not valid on ruleset imports"));
        }
        return parse_git_import(body, directive).map(|i| vec![i]);
    }

    if body.starts_with('@') {
        let word = body.split_whitespace().next().unwrap_or(body);
        return Err(skip(format!("unknown directive {}", word)));
    }

    if is_remote(body) {
        let spec = parse_remote(body, true).ok_or_else(|| skip("malformed repository URL"))?;
        let patterns: Vec<Option<String>> = match &spec.pattern {
            Some(p) => expand_braces(p).map_err(LineError::Skip)?.into_iter().map(Some).collect(),
            None => vec![None],
        };
        return Ok(patterns
            .into_iter()
            .map(|pattern| Instruction::Remote {
                spec: super::RemoteSpec {
                    pattern,
                    ..spec.clone()
                },
                exclude,
                directive: directive.clone(),
            })
            .collect());
    }

    Ok(expand_braces(body)
        .map_err(LineError::Skip)?
        .into_iter()
        .map(|text| Instruction::Pattern {
            text,
            exclude,
            directive: directive.clone(),
        })
        .collect())
}

fn strip_any<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| line.strip_prefix(p))
}

fn parse_cache_directive(line: &str) -> Result<Option<Instruction>, LineError> {
    Ok(Some(match line {
        "@freeze-cache" => Instruction::FreezeCache,
        "@no-expire" => Instruction::NoExpire,
        "@disable-cache" => Instruction::DisableCache,
        _ => {
            let Some(value) = line.strip_prefix("@expire-time") else {
                return Ok(None);
            };
            if !value.is_empty() && !value.starts_with(char::is_whitespace) && !value.starts_with(':') {
                return Ok(None);
            }
            let value = value.trim_start_matches(':').trim();
            let duration = parse_duration(value).map_err(|reason| LineError::InvalidDuration {
                value: value.to_string(),
                reason,
            })?;
            Instruction::ExpireTime(duration)
        }
    }))
}

fn parse_alias(
    value: &str,
    exclude: bool,
    directive: Option<ContentDirective>,
) -> Result<Vec<Instruction>, LineError> {
    if value.is_empty() {
        return Err(skip("empty alias"));
    }

    if value.starts_with(GIT_PREFIX) {
        if exclude {
            return Err(skip("exclusion is not valid on ruleset imports"));
        }
        return parse_git_import(value, directive).map(|i| vec![i]);
    }

    if let Some((alias, ruleset)) = value.split_once("::") {
        if exclude {
            return Err(skip("exclusion is not valid on ruleset imports"));
        }
        let (alias, ruleset) = (alias.trim(), ruleset.trim());
        if alias.is_empty() || ruleset.is_empty() {
            return Err(skip("ruleset import needs both an alias and a ruleset name"));
        }
        return Ok(vec![Instruction::Import(ImportReference {
            kind: ImportKind::AliasRuleset,
            identifier: alias.to_string(),
            ruleset: Some(ruleset.to_string()),
            reference: None,
            source_line: 0,
            directive,
        })]);
    }

    let (alias, pattern) = match value.split_once('/') {
        Some((alias, pattern)) => (alias, Some(pattern)),
        None => (value, None),
    };
    if alias.is_empty() {
        return Err(skip("empty alias"));
    }

    let patterns: Vec<Option<String>> = match pattern.filter(|p| !p.is_empty()) {
        Some(p) => expand_braces(p)
            .map_err(LineError::Skip)?
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None],
    };

    Ok(patterns
        .into_iter()
        .map(|pattern| Instruction::AliasPattern {
            alias: alias.to_string(),
            pattern,
            exclude,
            directive: directive.clone(),
        })
        .collect())
}

/// `git::<url>@<ref>::<ruleset>`
fn parse_git_import(body: &str, directive: Option<ContentDirective>) -> Result<Instruction, LineError> {
    let rest = body.strip_prefix(GIT_PREFIX).unwrap_or(body);
    let (repo, ruleset) = rest
        .rsplit_once("::")
        .ok_or_else(|| skip("git import needs ::<ruleset>"))?;
    let ruleset = ruleset.trim();
    if ruleset.is_empty() {
        return Err(skip("git import needs ::<ruleset>"));
    }
    let spec = parse_remote(repo.trim(), false).ok_or_else(|| skip("malformed repository URL"))?;
    Ok(Instruction::Import(ImportReference {
        kind: ImportKind::GitRuleset,
        identifier: spec.url,
        ruleset: Some(ruleset.to_string()),
        reference: spec.reference,
        source_line: 0,
        directive,
    }))
}
