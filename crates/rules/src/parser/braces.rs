//! Brace-group expansion: `src/{a,b}/*.rs` → `src/a/*.rs`, `src/b/*.rs`.

/// Expand every top-level and nested `{x,y}` group into sibling strings,
/// left to right. A group without a comma is unwrapped (`{a}` → `a`).
pub fn expand_braces(input: &str) -> Result<Vec<String>, String> {
    let Some(open) = input.find('{') else {
        if input.contains('}') {
            return Err("unbalanced braces".to_string());
        }
        return Ok(vec![input.to_string()]);
    };

    let close = matching_close(input, open).ok_or_else(|| "unbalanced braces".to_string())?;
    let prefix = &input[..open];
    let body = &input[open + 1..close];
    let suffix = &input[close + 1..];

    if prefix.contains('}') {
        return Err("unbalanced braces".to_string());
    }

    let mut out = Vec::new();
    for alternative in split_top_level(body) {
        for expanded_alt in expand_braces(alternative)? {
            for expanded_suffix in expand_braces(suffix)? {
                out.push(format!("{}{}{}", prefix, expanded_alt, expanded_suffix));
            }
        }
    }
    Ok(out)
}

fn matching_close(input: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}
