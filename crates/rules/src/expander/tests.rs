//! Expansion tests over temporary project trees.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use ctxbundle_core::{
    CoreError, RepoFetcher, StaticCatalog, WorkspaceInfo, YamlProjectLoader,
};

use super::*;
use crate::alias::{AliasResolver, Sandbox};
use crate::error::RuleError;
use crate::model::{ContentDirective, RuleSet};

/// Fetcher serving pre-built directories.
#[derive(Default)]
struct MapFetcher {
    checkouts: HashMap<String, PathBuf>,
}

impl RepoFetcher for MapFetcher {
    fn ensure(&self, url: &str, _reference: Option<&str>) -> ctxbundle_core::Result<PathBuf> {
        self.checkouts
            .get(url)
            .cloned()
            .ok_or_else(|| CoreError::Git(format!("unknown repository {}", url)))
    }
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    aliases: Arc<AliasResolver>,
    sandbox: Sandbox,
    fetcher: MapFetcher,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for sub in ["app", "team/shared", "team/web", "vendor/repo"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        let catalog = StaticCatalog::new(vec![
            WorkspaceInfo::project("app", root.join("app")),
            WorkspaceInfo::project("team", root.join("team")),
            WorkspaceInfo::project("shared", root.join("team/shared")).in_ecosystem(root.join("team")),
            WorkspaceInfo::project("web", root.join("team/web")).in_ecosystem(root.join("team")),
        ]);
        let aliases = Arc::new(AliasResolver::new(Arc::new(catalog), root.join("app")));
        let sandbox = Sandbox::new(Arc::clone(&aliases));
        let mut fetcher = MapFetcher::default();
        fetcher
            .checkouts
            .insert("https://github.com/org/repo".into(), root.join("vendor/repo"));
        Self {
            _dir: dir,
            root,
            aliases,
            sandbox,
            fetcher,
        }
    }

    fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn expand(&self, rules: &str) -> crate::error::Result<RuleSet> {
        let path = self.write("app/context.rules", rules);
        RuleExpander::new(&self.aliases, &self.sandbox, &self.fetcher, &YamlProjectLoader)
            .expand_file(&path, &self.root.join("app"))
    }

    fn shared(&self) -> String {
        self.root.join("team/shared").to_string_lossy().into_owned()
    }
}

fn texts(patterns: &[crate::model::RulePattern]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

// ── top-level files ────────────────────────────────────────────────

#[test]
fn top_level_patterns_stay_relative_and_split_tiers() {
    let fx = Fixture::new();
    let set = fx.expand("*.go\n!*_test.go\n---\ndocs/**/*.md\n").unwrap();

    assert_eq!(texts(&set.hot), vec!["*.go", "!*_test.go"]);
    assert_eq!(texts(&set.cold), vec!["docs/**/*.md"]);
    assert_eq!(set.hot[1].source_line, 2);
    assert_eq!(set.hot[1].effective_line, 2);
    assert_eq!(set.cold[0].effective_line, 4);
}

#[test]
fn unreadable_top_level_file_is_fatal() {
    let fx = Fixture::new();
    let err = RuleExpander::new(&fx.aliases, &fx.sandbox, &fx.fetcher, &YamlProjectLoader)
        .expand_file(&fx.root.join("app/missing.rules"), &fx.root.join("app"))
        .unwrap_err();
    assert!(matches!(err, RuleError::Read { .. }));
}

#[test]
fn invalid_expire_time_is_fatal() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.expand("@expire-time soon\n"),
        Err(RuleError::InvalidExpireTime { line: 1, .. })
    ));
}

#[test]
fn invalid_expire_time_in_imported_ruleset_is_fatal() {
    let fx = Fixture::new();
    fx.write("team/shared/.ctxbundle/rulesets/docs.rules", "@expire-time soon
*.md
");
    assert!(matches!(
        fx.expand("*.rs
@a:shared::docs
"),
        Err(RuleError::InvalidExpireTime { line: 1, .. })
    ));
}

#[test]
fn cache_directives_recorded_at_top_level() {
    let fx = Fixture::new();
    let set = fx
        .expand("@freeze-cache\n@no-expire\n@disable-cache\n@expire-time 2h\n")
        .unwrap();
    assert!(set.cache.freeze && set.cache.no_expire && set.cache.disabled);
    assert_eq!(set.cache.expire_after, Some(Duration::from_secs(7200)));
}

#[test]
fn file_default_directive_fills_patterns_without_one() {
    let fx = Fixture::new();
    let set = fx
        .expand("*.rs\n@grep: \"unsafe\"\nsrc/*.c @find: \"ffi\"\n")
        .unwrap();
    assert_eq!(set.hot[0].directive, Some(ContentDirective::Grep("unsafe".into())));
    assert_eq!(set.hot[1].directive, Some(ContentDirective::Find("ffi".into())));
}

#[test]
fn file_default_directive_skips_exclusions() {
    let fx = Fixture::new();
    let set = fx.expand("*.rs
!gen/*.rs
@grep: \"unsafe\"\n").unwrap();
    assert_eq!(set.hot[0].directive, Some(ContentDirective::Grep("unsafe".into())));
    assert!(set.hot[1].is_exclusion);
    assert_eq!(set.hot[1].directive, None);
}

#[test]
fn exclusion_with_directive_is_skipped() {
    let fx = Fixture::new();
    let set = fx.expand("*.go
!*_test.go @grep: \"x\"\n").unwrap();
    assert_eq!(texts(&set.hot), vec!["*.go"]);
    assert_eq!(set.skipped.len(), 1);
    assert_eq!(set.skipped[0].line, 2);
    assert_eq!(set.skipped[0].reason, "directive not supported on exclusions");
}

#[test]
fn alias_patterns_become_absolute() {
    let fx = Fixture::new();
    let set = fx.expand("@a:shared/src/**/*.rs\n!@a:team:web\n").unwrap();
    assert_eq!(set.hot[0].text, format!("{}/src/**/*.rs", fx.shared()));
    assert!(set.hot[1].is_exclusion);
    assert!(set.hot[1].text.ends_with("team/web/**"));
}

#[test]
fn unknown_alias_is_skipped() {
    let fx = Fixture::new();
    let set = fx.expand("@a:ghost/src\n*.md\n").unwrap();
    assert_eq!(texts(&set.hot), vec!["*.md"]);
    assert_eq!(set.skipped.len(), 1);
    assert_eq!(set.skipped[0].line, 1);
}

// ── ruleset imports ────────────────────────────────────────────────

#[test]
fn alias_import_rebases_and_credits_importing_line() {
    let fx = Fixture::new();
    fx.write(
        "team/shared/.ctxbundle/rulesets/backend.rules",
        "*.go\nsrc/api/\n!vendor/**\n",
    );
    let set = fx.expand("README.md\n@a:team:shared::backend\n").unwrap();

    assert_eq!(
        texts(&set.hot),
        vec![
            "README.md".to_string(),
            format!("{}/**/*.go", fx.shared()),
            format!("{}/src/api/", fx.shared()),
            format!("!{}/vendor/**", fx.shared()),
        ]
    );
    for pattern in &set.hot[1..] {
        assert_eq!(pattern.effective_line, 2);
    }
    assert_eq!(set.hot[3].source_line, 3);
}

#[test]
fn local_ruleset_directory_is_the_fallback() {
    let fx = Fixture::new();
    fx.write("team/shared/.ctxbundle/local/rulesets/mine.rules", "notes/*.md\n");
    let set = fx.expand("@a:shared::mine\n").unwrap();
    assert_eq!(texts(&set.hot), vec![format!("{}/notes/*.md", fx.shared())]);
}

#[test]
fn cold_import_collapses_into_cold() {
    let fx = Fixture::new();
    fx.write(
        "team/shared/.ctxbundle/rulesets/docs.rules",
        "docs/*.md\n---\nchangelog/*.md\n",
    );
    let hot_import = fx.expand("@a:shared::docs\n").unwrap();
    assert_eq!(hot_import.hot.len(), 1);
    assert_eq!(hot_import.cold.len(), 1);

    let cold_import = fx.expand("---\n@a:shared::docs\n").unwrap();
    assert!(cold_import.hot.is_empty());
    assert_eq!(cold_import.cold.len(), 2);
}

#[test]
fn import_directive_applies_to_imported_patterns() {
    let fx = Fixture::new();
    fx.write(
        "team/shared/.ctxbundle/rulesets/backend.rules",
        "*.go\n*.sql @find: \"migrations\"\n!*_test.go\n",
    );
    let set = fx.expand("@a:shared::backend @grep: \"TODO\"\n").unwrap();
    assert_eq!(set.hot[0].directive, Some(ContentDirective::Grep("TODO".into())));
    assert_eq!(set.hot[1].directive, Some(ContentDirective::Find("migrations".into())));
    assert!(set.hot[2].is_exclusion);
    assert_eq!(set.hot[2].directive, None);
}

#[test]
fn missing_ruleset_is_recoverable() {
    let fx = Fixture::new();
    let set = fx.expand("@a:shared::nope\n*.rs\n").unwrap();
    assert_eq!(texts(&set.hot), vec!["*.rs"]);
    assert!(set.skipped[0].reason.contains("not found"));
}

#[test]
fn imported_cache_directives_are_ignored() {
    let fx = Fixture::new();
    fx.write("team/shared/.ctxbundle/rulesets/frozen.rules", "@freeze-cache\n*.go\n");
    let set = fx.expand("@a:shared::frozen\n").unwrap();
    assert!(!set.cache.freeze);
    assert_eq!(set.hot.len(), 1);
}

#[test]
fn nested_views_are_rebased() {
    let fx = Fixture::new();
    fx.write("team/shared/.ctxbundle/rulesets/views.rules", "@view: docs/\n");
    let set = fx.expand("@v: team:web\n@a:shared::views\n").unwrap();
    assert_eq!(set.views, vec!["team:web".to_string(), format!("{}/docs/", fx.shared())]);
}

// ── cycles ─────────────────────────────────────────────────────────

#[test]
fn self_import_terminates() {
    let fx = Fixture::new();
    fx.write(
        "team/shared/.ctxbundle/rulesets/loop.rules",
        "*.go\n@a:shared::loop\n",
    );
    let set = fx.expand("@a:shared::loop\n").unwrap();
    assert_eq!(texts(&set.hot), vec![format!("{}/**/*.go", fx.shared())]);
    assert_eq!(set.skipped.len(), 1);
    assert!(set.skipped[0].reason.contains("cycle"));
}

#[test]
fn mutual_imports_terminate() {
    let fx = Fixture::new();
    fx.write("team/shared/.ctxbundle/rulesets/a.rules", "a.txt\n@a:web::b\n");
    fx.write("team/web/.ctxbundle/rulesets/b.rules", "b.txt\n@a:shared::a\n");
    let set = fx.expand("@a:shared::a\n").unwrap();

    let hot = texts(&set.hot);
    assert_eq!(hot.len(), 2);
    assert!(hot[0].ends_with("shared/**/a.txt"));
    assert!(hot[1].ends_with("web/**/b.txt"));
    assert!(set.skipped.iter().any(|s| s.reason.contains("cycle")));
}

#[test]
fn top_level_file_importing_itself_keeps_own_rules() {
    let fx = Fixture::new();
    fx.write("app/.ctxbundle/rulesets/self.rules", "*.rs\n@a:app::self\n");
    let path = fx.root.join("app/.ctxbundle/rulesets/self.rules");
    let set = RuleExpander::new(&fx.aliases, &fx.sandbox, &fx.fetcher, &YamlProjectLoader)
        .expand_file(&path, &fx.root.join("app"))
        .unwrap();
    assert_eq!(texts(&set.hot), vec!["*.rs"]);
    assert_eq!(set.skipped.len(), 1);
}

// ── git and project-default imports ────────────────────────────────

#[test]
fn git_import_without_default_ruleset_includes_checkout() {
    let fx = Fixture::new();
    let set = fx
        .expand("git::https://github.com/org/repo@v1::default\n")
        .unwrap();
    let checkout = fx.root.join("vendor/repo");
    assert_eq!(texts(&set.hot), vec![format!("{}/**", checkout.display())]);
    assert_eq!(set.hot[0].effective_line, 1);
}

#[test]
fn git_import_uses_named_ruleset() {
    let fx = Fixture::new();
    fx.write("vendor/repo/.ctxbundle/rulesets/go.rules", "*.go\n");
    let set = fx
        .expand("@a:git::https://github.com/org/repo@v1::go\n")
        .unwrap();
    assert!(set.hot[0].text.ends_with("vendor/repo/**/*.go"));
}

#[test]
fn git_import_missing_named_ruleset_is_skipped() {
    let fx = Fixture::new();
    let set = fx.expand("git::https://github.com/org/repo::python\n").unwrap();
    assert!(set.hot.is_empty());
    assert_eq!(set.skipped.len(), 1);
}

#[test]
fn remote_pattern_is_rooted_at_checkout() {
    let fx = Fixture::new();
    let set = fx.expand("https://github.com/org/repo@v1/docs/*.md\n").unwrap();
    assert!(set.hot[0].text.ends_with("vendor/repo/docs/*.md"));

    let set = fx.expand("https://github.com/other/missing\n").unwrap();
    assert!(set.hot.is_empty());
    assert!(set.skipped[0].reason.contains("fetch failed"));
}

#[test]
fn project_default_import() {
    let fx = Fixture::new();
    fx.write(
        "team/web/ctxbundle.yml",
        "context:\n  default_rules: .ctxbundle/rulesets/default.rules\n",
    );
    fx.write("team/web/.ctxbundle/rulesets/default.rules", "src/**/*.ts\n");
    let set = fx.expand("@default: ../team/web\n").unwrap();
    assert!(set.hot[0].text.ends_with("team/web/src/**/*.ts"));
    assert_eq!(set.hot[0].effective_line, 1);
}

#[test]
fn project_default_outside_sandbox_is_skipped() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root.join("stray")).unwrap();
    fx.write("stray/ctxbundle.yml", "context:\n  default_rules: all.rules\n");
    fx.write("stray/all.rules", "**\n");
    let set = fx.expand("@default: ../stray\n").unwrap();
    assert!(set.hot.is_empty());
    assert!(set.skipped[0].reason.contains("outside every allowed root"));
}
