//! Tests for the rule-line grammar.

use std::path::Path;
use std::time::Duration;

use super::*;
use crate::model::{ContentDirective, ImportKind};

fn one(line: &str) -> Instruction {
    let mut out = parse_line(line).unwrap();
    assert_eq!(out.len(), 1, "expected one instruction for {line:?}: {out:?}");
    out.remove(0)
}

fn skipped(line: &str) -> String {
    match parse_line(line) {
        Err(LineError::Skip(reason)) => reason,
        other => panic!("expected skip for {line:?}, got {other:?}"),
    }
}

// ── classification ─────────────────────────────────────────────────

#[test]
fn blank_and_comment_lines_yield_nothing() {
    assert!(parse_line("").unwrap().is_empty());
    assert!(parse_line("   ").unwrap().is_empty());
    assert!(parse_line("# *.go").unwrap().is_empty());
}

#[test]
fn separator() {
    assert_eq!(one("---"), Instruction::Separator);
    assert_eq!(one("  ---  "), Instruction::Separator);
}

#[test]
fn plain_and_excluded_patterns() {
    assert_eq!(
        one("*.go"),
        Instruction::Pattern {
            text: "*.go".into(),
            exclude: false,
            directive: None
        }
    );
    assert_eq!(
        one("!*_test.go"),
        Instruction::Pattern {
            text: "*_test.go".into(),
            exclude: true,
            directive: None
        }
    );
}

#[test]
fn cache_directives() {
    assert_eq!(one("@freeze-cache"), Instruction::FreezeCache);
    assert_eq!(one("@no-expire"), Instruction::NoExpire);
    assert_eq!(one("@disable-cache"), Instruction::DisableCache);
    assert_eq!(
        one("@expire-time 1h30m"),
        Instruction::ExpireTime(Duration::from_secs(5400))
    );
}

#[test]
fn invalid_expire_time_is_fatal_line_error() {
    assert!(matches!(
        parse_line("@expire-time whenever"),
        Err(LineError::InvalidDuration { .. })
    ));
    assert!(matches!(
        parse_line("@expire-time"),
        Err(LineError::InvalidDuration { .. })
    ));
}

#[test]
fn view_directives() {
    assert_eq!(one("@view: docs/"), Instruction::View("docs/".into()));
    assert_eq!(one("@v: team:api"), Instruction::View("team:api".into()));
}

#[test]
fn project_default_import() {
    match one("@default: ../shared-lib") {
        Instruction::Import(import) => {
            assert_eq!(import.kind, ImportKind::ProjectDefault);
            assert_eq!(import.identifier, "../shared-lib");
            assert!(import.ruleset.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn alias_ruleset_import() {
    match one("@a:team:shared-lib::backend-patterns") {
        Instruction::Import(import) => {
            assert_eq!(import.kind, ImportKind::AliasRuleset);
            assert_eq!(import.identifier, "team:shared-lib");
            assert_eq!(import.ruleset.as_deref(), Some("backend-patterns"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn git_ruleset_import_both_spellings() {
    for line in [
        "git::https://github.com/org/rules@v2::go",
        "@alias:git::https://github.com/org/rules@v2::go",
    ] {
        match one(line) {
            Instruction::Import(import) => {
                assert_eq!(import.kind, ImportKind::GitRuleset);
                assert_eq!(import.identifier, "https://github.com/org/rules");
                assert_eq!(import.reference.as_deref(), Some("v2"));
                assert_eq!(import.ruleset.as_deref(), Some("go"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn alias_pattern_with_and_without_path() {
    assert_eq!(
        one("@a:api/src/**/*.rs"),
        Instruction::AliasPattern {
            alias: "api".into(),
            pattern: Some("src/**/*.rs".into()),
            exclude: false,
            directive: None
        }
    );
    assert_eq!(
        one("!@alias:team:api"),
        Instruction::AliasPattern {
            alias: "team:api".into(),
            pattern: None,
            exclude: true,
            directive: None
        }
    );
}

#[test]
fn remote_reference() {
    match one("https://github.com/org/repo@v1.2.0/**/*.go") {
        Instruction::Remote { spec, exclude, .. } => {
            assert!(!exclude);
            assert_eq!(spec.url, "https://github.com/org/repo");
            assert_eq!(spec.reference.as_deref(), Some("v1.2.0"));
            assert_eq!(spec.pattern.as_deref(), Some("**/*.go"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn inline_directive_on_pattern_and_import() {
    assert_eq!(
        one(r#"pkg/**/*.go @grep: "TODO""#),
        Instruction::Pattern {
            text: "pkg/**/*.go".into(),
            exclude: false,
            directive: Some(ContentDirective::Grep("TODO".into()))
        }
    );
    match one(r#"@a:api::core @find: "handler""#) {
        Instruction::Import(import) => {
            assert_eq!(import.directive, Some(ContentDirective::Find("handler".into())));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn standalone_directive_sets_default() {
    assert_eq!(
        one(r#"@grep: "deprecated""#),
        Instruction::DefaultDirective(ContentDirective::Grep("deprecated".into()))
    );
}

#[test]
fn braces_expand_before_directive_and_inherit_flags() {
    let out = parse_line(r#"src/{a,b}/*.go @find: "x""#).unwrap();
    assert_eq!(out.len(), 2);
    for (instruction, expected) in out.iter().zip(["src/a/*.go", "src/b/*.go"]) {
        assert_eq!(
            instruction,
            &Instruction::Pattern {
                text: expected.into(),
                exclude: false,
                directive: Some(ContentDirective::Find("x".into()))
            }
        );
    }

    let out = parse_line("!src/{a,b}/*.go").unwrap();
    assert_eq!(out.len(), 2);
    assert!(out
        .iter()
        .all(|i| matches!(i, Instruction::Pattern { exclude: true, directive: None, .. })));
}

#[test]
fn exclusions_with_directives_are_skipped() {
    for line in [
        r#"!*.go @grep: "x""#,
        r#"!@a:lib/*.go @find: "x""#,
        r#"!src/{a,b}/*.go @find: "x""#,
    ] {
        assert_eq!(skipped(line), "directive not supported on exclusions");
    }
}

// ── skipped lines ──────────────────────────────────────────────────

#[test]
fn malformed_lines_are_skipped_with_reason() {
    assert!(skipped("@bogus thing").contains("unknown directive"));
    assert!(skipped("src/{a,b").contains("unbalanced"));
    assert!(skipped("@a:").contains("empty alias"));
    assert!(skipped("@a:api::").contains("ruleset"));
    assert!(skipped("!@a:api::core").contains("exclusion"));
    assert!(skipped("!").contains("empty"));
    assert!(skipped(r#"*.go @grep: """#).contains("empty"));
    assert!(skipped("https://github.com/org").contains("malformed"));
}

// ── whole files ────────────────────────────────────────────────────

#[test]
fn parse_rules_numbers_lines_and_collects_skips() {
    let text = "# comment\n*.go\n!*_test.go\n@nope\n---\ndocs/**/*.md\n";
    let parsed = parse_rules(text, Path::new("/p/rules")).unwrap();

    let lines: Vec<_> = parsed.lines.iter().map(|l| l.line).collect();
    assert_eq!(lines, vec![2, 3, 5, 6]);
    assert_eq!(parsed.skipped.len(), 1);
    assert_eq!(parsed.skipped[0].line, 4);
    assert_eq!(parsed.skipped[0].file, Path::new("/p/rules"));
}

#[test]
fn parse_rules_stamps_import_lines() {
    let parsed = parse_rules("\n\n@a:api::core\n", Path::new("/p/rules")).unwrap();
    match &parsed.lines[0].instruction {
        Instruction::Import(import) => assert_eq!(import.source_line, 3),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse_rules_fails_on_bad_expire_time() {
    let err = parse_rules("*.go\n@expire-time never\n", Path::new("/p/rules")).unwrap_err();
    match err {
        crate::error::RuleError::InvalidExpireTime { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn last_standalone_directive_is_the_default() {
    let parsed = parse_rules("@find: a\n*.rs\n@grep: b\n", Path::new("/p/rules")).unwrap();
    assert_eq!(
        parsed.default_directive(),
        Some(&ContentDirective::Grep("b".into()))
    );
}
