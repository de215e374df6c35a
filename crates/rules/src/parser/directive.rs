//! Content directives (`@find:` / `@grep:`) and `@expire-time` durations.

use std::time::Duration;

use crate::model::ContentDirective;

const FIND: &str = "@find:";
const GREP: &str = "@grep:";

/// Split a trailing ` @find: "q"` / ` @grep: "q"` off a rule line.
///
/// Returns the remaining body and the directive, if present. The marker must
/// be preceded by whitespace; a line that *starts* with a marker is a
/// standalone directive and is handled by [`parse_standalone`].
pub fn split_directive(line: &str) -> Result<(&str, Option<ContentDirective>), String> {
    let Some((idx, marker)) = find_trailing_marker(line) else {
        return Ok((line, None));
    };
    let body = line[..idx].trim_end();
    let value = &line[idx + marker.len()..];
    let directive = build(marker, value)?;
    Ok((body, Some(directive)))
}

/// Parse a line that is nothing but a directive (`@grep: "TODO"`).
pub fn parse_standalone(line: &str) -> Option<Result<ContentDirective, String>> {
    for marker in [FIND, GREP] {
        if let Some(value) = line.strip_prefix(marker) {
            return Some(build(marker, value));
        }
    }
    None
}

fn find_trailing_marker(line: &str) -> Option<(usize, &'static str)> {
    [FIND, GREP]
        .into_iter()
        .filter_map(|marker| {
            line.match_indices(marker)
                .filter(|(i, _)| *i > 0 && line[..*i].ends_with(char::is_whitespace))
                .map(|(i, _)| i)
                .last()
                .map(|i| (i, marker))
        })
        .max_by_key(|(i, _)| *i)
}

fn build(marker: &str, raw: &str) -> Result<ContentDirective, String> {
    let query = unquote(raw.trim());
    if query.is_empty() {
        return Err(format!("empty {} query", marker.trim_end_matches(':')));
    }
    Ok(match marker {
        FIND => ContentDirective::Find(query.to_string()),
        _ => ContentDirective::Grep(query.to_string()),
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse an `@expire-time` value such as `90m`, `1h30m`, `2d` or `1h 30m`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("missing duration".to_string());
    }
    let duration = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("duration must be positive".to_string());
    }
    Ok(duration)
}
