//! Rewriting imported patterns so they apply under the imported project.

use std::path::Path;

use ctxbundle_core::paths::{normalize_lexically, to_slash};

/// Rebase `pattern` (written relative to some project) onto `root`.
///
/// - absolute patterns are returned unchanged;
/// - patterns containing `/` (including `./` and `../` prefixes, and
///   patterns starting with `**`) are joined to `root`;
/// - slash-free globs become `root/**/pattern`, keeping their
///   match-at-any-depth meaning.
///
/// A trailing `/` (directory-only marker) survives the rewrite.
pub fn rebase_pattern(pattern: &str, root: &Path) -> String {
    if pattern.starts_with('/') {
        return pattern.to_string();
    }
    let root = to_slash(root);
    let root = root.trim_end_matches('/');

    if pattern.starts_with("**") {
        return format!("{}/{}", root, pattern);
    }
    if !pattern.contains('/') {
        return format!("{}/**/{}", root, pattern);
    }

    let dir_only = pattern.ends_with('/');
    let joined = normalize_lexically(&Path::new(root).join(pattern));
    let mut out = to_slash(&joined);
    if dir_only && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Rebase a `@view:` hint. Aliases (`team:api`) and absolute paths pass
/// through untouched.
pub fn rebase_view(view: &str, root: &Path) -> String {
    if view.starts_with('/') || view.starts_with('~') || view.contains(':') {
        return view.to_string();
    }
    let dir_only = view.ends_with('/');
    let mut out = to_slash(&normalize_lexically(&root.join(view)));
    if dir_only && !out.ends_with('/') {
        out.push('/');
    }
    out
}
