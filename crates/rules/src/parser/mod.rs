//! Rule-line grammar.
//!
//! Every non-blank, non-comment line of a rule file becomes one or more
//! [`Instruction`]s (brace groups fan a single line out into siblings).
//! Malformed lines are collected as skipped rules; only an invalid
//! `@expire-time` aborts parsing.

mod braces;
mod directive;
mod line;
mod remote;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RuleError, SkippedRule};
use crate::model::{ContentDirective, ImportReference};

pub use self::braces::expand_braces;
pub use self::directive::{parse_duration, split_directive};
pub use self::line::{parse_line, LineError};
pub use self::remote::{parse_remote, RemoteSpec};

/// A single typed instruction produced from a rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `---`: subsequent lines go to the cold tier.
    Separator,
    /// Plain glob.
    Pattern {
        text: String,
        exclude: bool,
        directive: Option<ContentDirective>,
    },
    /// `@a:<alias>[/<pattern>]`
    AliasPattern {
        alias: String,
        pattern: Option<String>,
        exclude: bool,
        directive: Option<ContentDirective>,
    },
    /// `<url>[@ref][/<pattern>]`
    Remote {
        spec: RemoteSpec,
        exclude: bool,
        directive: Option<ContentDirective>,
    },
    /// Ruleset import or project default.
    Import(ImportReference),
    /// `@view:` / `@v:` navigation hint.
    View(String),
    FreezeCache,
    NoExpire,
    DisableCache,
    ExpireTime(Duration),
    /// Standalone `@find:` / `@grep:` line: file-wide default directive.
    DefaultDirective(ContentDirective),
}

/// An instruction with its line number and original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line: usize,
    pub text: String,
    pub instruction: Instruction,
}

/// Result of parsing one rule file.
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub lines: Vec<ParsedLine>,
    pub skipped: Vec<SkippedRule>,
}

impl ParsedRules {
    /// The file-wide default directive (the last standalone one wins).
    pub fn default_directive(&self) -> Option<&ContentDirective> {
        self.lines.iter().rev().find_map(|l| match &l.instruction {
            Instruction::DefaultDirective(d) => Some(d),
            _ => None,
        })
    }
}

/// Parse a whole rule file. `origin` is recorded on skipped entries.
pub fn parse_rules(text: &str, origin: &Path) -> Result<ParsedRules> {
    let mut parsed = ParsedRules::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        match parse_line(raw) {
            Ok(instructions) => {
                for instruction in instructions {
                    let instruction = match instruction {
                        Instruction::Import(mut import) => {
                            import.source_line = line_no;
                            Instruction::Import(import)
                        }
                        other => other,
                    };
                    parsed.lines.push(ParsedLine {
                        line: line_no,
                        text: raw.trim().to_string(),
                        instruction,
                    });
                }
            }
            Err(LineError::Skip(reason)) => {
                tracing::debug!(line = line_no, text = raw.trim(), %reason, "skipping rule line");
                parsed
                    .skipped
                    .push(SkippedRule::new(origin, line_no, raw.trim(), reason));
            }
            Err(LineError::InvalidDuration { value, reason }) => {
                return Err(RuleError::InvalidExpireTime {
                    line: line_no,
                    value,
                    reason,
                });
            }
        }
    }

    Ok(parsed)
}
