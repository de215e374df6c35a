//! Remote repository references: `https://host/owner/repo[@ref][/pattern]`.

/// A parsed repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    /// Clone URL (`https://host/owner/repo` or `git@host:owner/repo`).
    pub url: String,
    pub reference: Option<String>,
    /// Pattern inside the checkout; `None` means the whole repository.
    pub pattern: Option<String>,
}

/// Whether a rule body looks like a repository URL.
pub fn is_remote(body: &str) -> bool {
    body.starts_with("https://")
        || body.starts_with("http://")
        || body.starts_with("git@")
        || body.starts_with("github.com/")
}

/// Parse a URL-shaped rule body. With `allow_pattern = false` everything
/// after `@` is the ref (refs may then contain `/`).
pub fn parse_remote(body: &str, allow_pattern: bool) -> Option<RemoteSpec> {
    let (prefix, rest) = if let Some(rest) = body.strip_prefix("https://") {
        ("https://".to_string(), rest)
    } else if let Some(rest) = body.strip_prefix("http://") {
        ("http://".to_string(), rest)
    } else if body.starts_with("github.com/") {
        ("https://".to_string(), body)
    } else if let Some(rest) = body.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        if host.is_empty() {
            return None;
        }
        return split_repo_path(path, allow_pattern).map(|(repo, reference, pattern)| RemoteSpec {
            url: format!("git@{}:{}", host, repo),
            reference,
            pattern,
        });
    } else {
        return None;
    };

    let (host, path) = rest.split_once('/')?;
    if host.is_empty() {
        return None;
    }
    let (repo, reference, pattern) = split_repo_path(path, allow_pattern)?;
    Some(RemoteSpec {
        url: format!("{}{}/{}", prefix, host, repo),
        reference,
        pattern,
    })
}

/// Split `owner/repo[@ref][/pattern]` into its parts.
fn split_repo_path(path: &str, allow_pattern: bool) -> Option<(String, Option<String>, Option<String>)> {
    let mut segments = path.splitn(2, '/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let remainder = segments.next().filter(|s| !s.is_empty())?;

    // `@` only introduces a ref when it appears in the repo segment.
    let first_slash = remainder.find('/');
    let at = remainder
        .find('@')
        .filter(|&at| first_slash.map_or(true, |slash| at < slash));

    let (repo_and_ref, pattern) = match at {
        Some(_) if !allow_pattern => (remainder, None),
        Some(at) => {
            // The ref ends at the first `/` after `@`.
            match remainder[at..].find('/') {
                Some(slash) => (&remainder[..at + slash], Some(&remainder[at + slash + 1..])),
                None => (remainder, None),
            }
        }
        None if allow_pattern => match remainder.split_once('/') {
            Some((repo, pattern)) => (repo, Some(pattern)),
            None => (remainder, None),
        },
        None => (remainder, None),
    };

    let (repo, reference) = match repo_and_ref.split_once('@') {
        Some((repo, reference)) => (repo, Some(reference.to_string()).filter(|r| !r.is_empty())),
        None => (repo_and_ref, None),
    };
    if repo.is_empty() || repo.contains('/') {
        return None;
    }

    let pattern = pattern.map(str::to_string).filter(|p| !p.is_empty());
    Some((format!("{}/{}", owner, repo), reference, pattern))
}
