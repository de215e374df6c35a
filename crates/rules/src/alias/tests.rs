//! Alias resolution, sandbox and guard tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctxbundle_core::{CoreError, StaticCatalog, WorkspaceInfo, WorkspaceLookup};

use super::*;
use crate::error::RuleError;
use crate::model::RulePattern;

fn catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        WorkspaceInfo::project("team", "/code/team"),
        WorkspaceInfo::project("api", "/code/team/api").in_ecosystem("/code/team"),
        WorkspaceInfo::project("web", "/code/team/web").in_ecosystem("/code/team"),
        WorkspaceInfo::project("feature-x", "/code/team/api/.worktrees/feature-x")
            .in_ecosystem("/code/team")
            .as_worktree("feature-x", "/code/team/api"),
        // Ecosystem worktree holding its own checkout of both projects.
        WorkspaceInfo::project("api", "/code/team/.worktrees/feature-y/api")
            .in_ecosystem("/code/team")
            .as_worktree("feature-y", "/code/team/api"),
        WorkspaceInfo::project("web", "/code/team/.worktrees/feature-y/web")
            .in_ecosystem("/code/team")
            .as_worktree("feature-y", "/code/team/web"),
        WorkspaceInfo::project("api", "/code/other/api").in_ecosystem("/code/other"),
        WorkspaceInfo::project("secrets", "/code/team/secrets")
            .in_ecosystem("/code/team")
            .excluded(),
    ])
}

fn resolver_at(dir: &str) -> AliasResolver {
    AliasResolver::new(Arc::new(catalog()), dir)
}

/// Lookup whose discovery always fails.
struct BrokenLookup;

impl WorkspaceLookup for BrokenLookup {
    fn resolve(&self, _name_or_path: &str) -> ctxbundle_core::Result<Option<WorkspaceInfo>> {
        Err(CoreError::Discovery("catalog offline".into()))
    }

    fn all(&self) -> ctxbundle_core::Result<Vec<WorkspaceInfo>> {
        Err(CoreError::Discovery("catalog offline".into()))
    }
}

// ── parsing ────────────────────────────────────────────────────────

#[test]
fn parse_component_counts() {
    assert_eq!(WorkspaceAlias::parse("api").unwrap(), WorkspaceAlias::Name("api".into()));
    assert_eq!(
        WorkspaceAlias::parse("team:api").unwrap(),
        WorkspaceAlias::Pair("team".into(), "api".into())
    );
    assert_eq!(
        WorkspaceAlias::parse("team:api:feature-x").unwrap(),
        WorkspaceAlias::Triple("team".into(), "api".into(), "feature-x".into())
    );
}

#[test]
fn parse_rejects_malformed_aliases() {
    assert!(matches!(WorkspaceAlias::parse("a:b:c:d"), Err(AliasError::Invalid { .. })));
    assert!(matches!(WorkspaceAlias::parse("team::api"), Err(AliasError::Invalid { .. })));
    assert!(matches!(WorkspaceAlias::parse(""), Err(AliasError::Invalid { .. })));
}

// ── resolution ─────────────────────────────────────────────────────

#[test]
fn bare_name_prefers_non_worktree_project() {
    let resolver = resolver_at("/elsewhere");
    assert_eq!(resolver.resolve("web").unwrap(), PathBuf::from("/code/team/web"));
}

#[test]
fn bare_name_ties_break_by_path() {
    // Two non-worktree `api` projects: the lexically first path wins.
    let resolver = resolver_at("/elsewhere");
    assert_eq!(resolver.resolve("api").unwrap(), PathBuf::from("/code/other/api"));
}

#[test]
fn bare_name_prefers_sibling_in_caller_worktree_group() {
    let resolver = resolver_at("/code/team/.worktrees/feature-y/web/src");
    assert_eq!(
        resolver.resolve("api").unwrap(),
        PathBuf::from("/code/team/.worktrees/feature-y/api")
    );
}

#[test]
fn pair_resolves_ecosystem_and_repo() {
    let resolver = resolver_at("/elsewhere");
    assert_eq!(resolver.resolve("team:api").unwrap(), PathBuf::from("/code/team/api"));
    assert_eq!(resolver.resolve("other:api").unwrap(), PathBuf::from("/code/other/api"));
}

#[test]
fn pair_falls_back_to_repo_and_worktree() {
    let resolver = resolver_at("/elsewhere");
    assert_eq!(
        resolver.resolve("api:feature-x").unwrap(),
        PathBuf::from("/code/team/api/.worktrees/feature-x")
    );
}

#[test]
fn triple_resolves_exact_worktree() {
    let resolver = resolver_at("/elsewhere");
    assert_eq!(
        resolver.resolve("team:api:feature-x").unwrap(),
        PathBuf::from("/code/team/api/.worktrees/feature-x")
    );
}

#[test]
fn missing_worktree_is_a_named_error() {
    let resolver = resolver_at("/elsewhere");
    assert_eq!(
        resolver.resolve("team:api:feature-z").unwrap_err(),
        AliasError::NotFound("team:api:feature-z".into())
    );
    assert_eq!(
        resolver.resolve("nobody").unwrap_err(),
        AliasError::NotFound("nobody".into())
    );
}

#[test]
fn caller_is_innermost_workspace() {
    let resolver = resolver_at("/code/team/api/.worktrees/feature-x/src");
    let caller = resolver.caller().unwrap().unwrap();
    assert_eq!(caller.worktree_name.as_deref(), Some("feature-x"));
}

#[test]
fn discovery_failure_surfaces() {
    let resolver = AliasResolver::new(Arc::new(BrokenLookup), "/x");
    assert!(matches!(resolver.resolve("api"), Err(AliasError::Discovery(_))));
}

// ── sandbox ────────────────────────────────────────────────────────

fn sandbox() -> Sandbox {
    Sandbox::new(Arc::new(resolver_at("/code/team/api")))
        .allow("/opt/shared")
        .deny("/code/team/api/private")
        .with_config_dir("/home/u/.config/ctxbundle")
}

#[test]
fn workspace_roots_and_allow_list_are_readable() {
    let sandbox = sandbox();
    assert!(sandbox.is_path_allowed(Path::new("/code/team/web/src")).unwrap());
    assert!(sandbox.is_path_allowed(Path::new("/opt/shared/lib.rs")).unwrap());
    assert!(sandbox
        .is_path_allowed(Path::new("/home/u/.config/ctxbundle/config.toml"))
        .unwrap());
}

#[test]
fn deny_and_excluded_workspaces_win() {
    let sandbox = sandbox();
    assert!(!sandbox.is_path_allowed(Path::new("/code/team/api/private/key")).unwrap());
    // Excluded workspace nested in the allowed `team` ecosystem.
    assert!(!sandbox.is_path_allowed(Path::new("/code/team/secrets/x")).unwrap());
    assert!(!sandbox.is_path_allowed(Path::new("/tmp/x")).unwrap());
}

#[test]
fn filter_drops_escaping_patterns_and_records_them() {
    let origin = PathBuf::from("/code/team/api/rules");
    let patterns = vec![
        RulePattern::new("src/**/*.rs", false, 1, &origin),
        RulePattern::new("/tmp/**", false, 2, &origin),
        RulePattern::new("../web/**/*.ts", false, 3, &origin),
        RulePattern::new("../../../outside/*", true, 4, &origin),
    ];
    let (kept, skipped) = sandbox()
        .filter_patterns(patterns, Path::new("/code/team/api"))
        .unwrap();

    let kept: Vec<_> = kept.iter().map(|p| p.source_line).collect();
    assert_eq!(kept, vec![1, 3]);
    let lines: Vec<_> = skipped.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![2, 4]);
    assert_eq!(skipped[0].file, origin);
}

#[test]
fn sandbox_without_catalog_is_fatal() {
    let sandbox = Sandbox::new(Arc::new(AliasResolver::new(Arc::new(BrokenLookup), "/x")));
    assert!(matches!(
        sandbox.is_path_allowed(Path::new("/code")),
        Err(RuleError::SandboxUnavailable(_))
    ));
}

// ── interactive guard ──────────────────────────────────────────────

#[test]
fn guard_accepts_ordinary_rules() {
    for rule in ["src/**/*.rs", "!*_test.go", "../../sibling/*.md", "docs/ @grep: \"x\""] {
        assert_eq!(check_interactive_rule(rule), Ok(()), "{rule}");
    }
}

#[test]
fn guard_rejects_escapes() {
    assert!(matches!(
        check_interactive_rule("../../../x"),
        Err(RuleGuardError::TooManyParentSegments { count: 3 })
    ));
    for rule in ["**", "/**", "!**"] {
        assert!(matches!(check_interactive_rule(rule), Err(RuleGuardError::TooBroad(_))));
    }
    assert!(matches!(
        check_interactive_rule("/etc/passwd"),
        Err(RuleGuardError::SystemDirectory(_))
    ));
    assert!(matches!(
        check_interactive_rule("C:\\Windows\\System32\\*"),
        Err(RuleGuardError::SystemDirectory(_))
    ));
    assert!(matches!(
        check_interactive_rule("~/.ssh/id_rsa"),
        Err(RuleGuardError::SensitivePath(_))
    ));
    assert!(matches!(
        check_interactive_rule("~/.docker/config.json"),
        Err(RuleGuardError::SensitivePath(_))
    ));
    assert_eq!(check_interactive_rule("   "), Err(RuleGuardError::Empty));
}

#[test]
fn guard_does_not_confuse_prefix_names() {
    assert_eq!(check_interactive_rule("/etcetera/x"), Ok(()));
    assert_eq!(check_interactive_rule("/usrdata/*"), Ok(()));
}
