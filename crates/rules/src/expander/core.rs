//! [`RuleExpander`]: reads rule files and flattens their imports.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use ctxbundle_core::paths::{expand_home, normalize_lexically, to_slash};
use ctxbundle_core::{ProjectLoader, RepoFetcher};

use crate::alias::{AliasResolver, Sandbox};
use crate::error::{Result, RuleError, SkippedRule};
use crate::model::{ContentDirective, ImportKind, ImportReference, RulePattern, RuleSet};
use crate::parser::{parse_rules, Instruction, ParsedLine};

use super::rebase::{rebase_pattern, rebase_view};
use super::{find_ruleset, VisitedSet};

/// Ruleset name whose absence in a git checkout means "the whole repository".
const DEFAULT_RULESET: &str = "default";

/// Expands rule files using the injected collaborators.
pub struct RuleExpander<'a> {
    aliases: &'a AliasResolver,
    sandbox: &'a Sandbox,
    fetcher: &'a dyn RepoFetcher,
    projects: &'a dyn ProjectLoader,
}

/// Where a rule file sits in the import tree.
#[derive(Debug, Clone, Copy)]
struct Frame<'p> {
    /// Directory relative patterns in this file are written against.
    root: &'p Path,
    /// `None` at top level; otherwise the line credited for every pattern.
    importer_line: Option<usize>,
}

impl Frame<'_> {
    fn is_nested(&self) -> bool {
        self.importer_line.is_some()
    }
}

impl<'a> RuleExpander<'a> {
    pub fn new(
        aliases: &'a AliasResolver,
        sandbox: &'a Sandbox,
        fetcher: &'a dyn RepoFetcher,
        projects: &'a dyn ProjectLoader,
    ) -> Self {
        Self {
            aliases,
            sandbox,
            fetcher,
            projects,
        }
    }

    /// Expand a top-level rule file. Relative patterns stay relative to
    /// `root` (the working directory).
    pub fn expand_file(&self, rule_path: &Path, root: &Path) -> Result<RuleSet> {
        let mut visited = VisitedSet::default();
        self.expand(rule_path, root, &mut visited, None)
    }

    /// Expand one rule file.
    ///
    /// With `importer_effective_line` set, the file is an import: relative
    /// patterns are rebased onto `root`, every pattern is credited to that
    /// line, and cache directives are ignored. A file already in `visited`
    /// contributes nothing.
    pub fn expand(
        &self,
        rule_path: &Path,
        root: &Path,
        visited: &mut VisitedSet,
        importer_effective_line: Option<usize>,
    ) -> Result<RuleSet> {
        if !visited.insert(rule_path) {
            debug!(path = %rule_path.display(), "rule file already visited");
            return Ok(RuleSet::default());
        }

        let text = fs::read_to_string(rule_path).map_err(|source| RuleError::Read {
            path: rule_path.to_path_buf(),
            source,
        })?;
        let parsed = parse_rules(&text, rule_path)?;
        let default_directive = parsed.default_directive().cloned();

        let frame = Frame {
            root,
            importer_line: importer_effective_line,
        };
        let mut set = RuleSet {
            skipped: parsed.skipped,
            ..RuleSet::default()
        };
        let mut cold = false;

        for line in parsed.lines {
            let effective = frame.importer_line.unwrap_or(line.line);
            match line.instruction {
                Instruction::Separator => cold = true,
                Instruction::Pattern {
                    ref text,
                    exclude,
                    ref directive,
                } => {
                    let text = if frame.is_nested() {
                        rebase_pattern(text, root)
                    } else {
                        text.clone()
                    };
                    let pattern = RulePattern::new(text, exclude, line.line, rule_path)
                        .with_directive(own_directive(exclude, directive, &default_directive))
                        .credited_to(effective);
                    push(&mut set, pattern, cold);
                }
                Instruction::AliasPattern {
                    ref alias,
                    ref pattern,
                    exclude,
                    ref directive,
                } => match self.aliases.resolve(alias) {
                    Ok(target) => {
                        let text = rebase_pattern(pattern.as_deref().unwrap_or("**"), &target);
                        let pattern = RulePattern::new(text, exclude, line.line, rule_path)
                            .with_directive(own_directive(exclude, directive, &default_directive))
                            .credited_to(effective);
                        push(&mut set, pattern, cold);
                    }
                    Err(e) => skip(&mut set, rule_path, &line, e.to_string()),
                },
                Instruction::Remote {
                    ref spec,
                    exclude,
                    ref directive,
                } => match self.fetcher.ensure(&spec.url, spec.reference.as_deref()) {
                    Ok(checkout) => {
                        let text = rebase_pattern(spec.pattern.as_deref().unwrap_or("**"), &checkout);
                        let pattern = RulePattern::new(text, exclude, line.line, rule_path)
                            .with_directive(own_directive(exclude, directive, &default_directive))
                            .credited_to(effective);
                        push(&mut set, pattern, cold);
                    }
                    Err(e) => skip(&mut set, rule_path, &line, format!("fetch failed: {}", e)),
                },
                Instruction::Import(ref import) => {
                    let directive = import.directive.clone().or_else(|| default_directive.clone());
                    match self.expand_import(import, rule_path, frame, visited, effective) {
                        Ok(mut child) => {
                            if let Some(directive) = directive {
                                inherit_directive(&mut child, &directive);
                            }
                            set.merge(child, cold);
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => skip(&mut set, rule_path, &line, e.to_string()),
                    }
                }
                Instruction::View(ref view) => {
                    let view = if frame.is_nested() {
                        rebase_view(view, root)
                    } else {
                        view.clone()
                    };
                    set.views.push(view);
                }
                Instruction::FreezeCache if !frame.is_nested() => set.cache.freeze = true,
                Instruction::NoExpire if !frame.is_nested() => set.cache.no_expire = true,
                Instruction::DisableCache if !frame.is_nested() => set.cache.disabled = true,
                Instruction::ExpireTime(duration) if !frame.is_nested() => {
                    set.cache.expire_after = Some(duration)
                }
                Instruction::FreezeCache
                | Instruction::NoExpire
                | Instruction::DisableCache
                | Instruction::ExpireTime(_) => {
                    debug!(
                        path = %rule_path.display(),
                        line = line.line,
                        "cache directive ignored in imported file"
                    );
                }
                Instruction::DefaultDirective(_) => {}
            }
        }

        debug!(
            path = %rule_path.display(),
            hot = set.hot.len(),
            cold = set.cold.len(),
            skipped = set.skipped.len(),
            "rule file expanded"
        );
        Ok(set)
    }

    fn expand_import(
        &self,
        import: &ImportReference,
        importer: &Path,
        frame: Frame<'_>,
        visited: &mut VisitedSet,
        effective: usize,
    ) -> Result<RuleSet> {
        match import.kind {
            ImportKind::AliasRuleset => {
                let target = self.aliases.resolve(&import.identifier)?;
                let name = ruleset_name(import)?;
                let path = find_ruleset(&target, name).ok_or_else(|| {
                    RuleError::import(
                        &import.identifier,
                        format!("ruleset {:?} not found in {}", name, target.display()),
                    )
                })?;
                self.expand_nested(&path, &target, visited, effective, import)
            }
            ImportKind::GitRuleset => {
                let checkout = self
                    .fetcher
                    .ensure(&import.identifier, import.reference.as_deref())?;
                let name = ruleset_name(import)?;
                match find_ruleset(&checkout, name) {
                    Some(path) => self.expand_nested(&path, &checkout, visited, effective, import),
                    None if name == DEFAULT_RULESET => {
                        debug!(
                            url = %import.identifier,
                            checkout = %checkout.display(),
                            "no default ruleset, including whole checkout"
                        );
                        let pattern = RulePattern::new(
                            format!("{}/**", to_slash(&checkout).trim_end_matches('/')),
                            false,
                            import.source_line,
                            importer,
                        )
                        .credited_to(effective);
                        Ok(RuleSet {
                            hot: vec![pattern],
                            ..RuleSet::default()
                        })
                    }
                    None => Err(RuleError::import(
                        &import.identifier,
                        format!("ruleset {:?} not found in checkout", name),
                    )),
                }
            }
            ImportKind::ProjectDefault => {
                let raw = expand_home(&import.identifier);
                let project = normalize_lexically(&frame.root.join(raw));
                if !self.sandbox.is_path_allowed(&project)? {
                    return Err(RuleError::Disallowed(project));
                }
                let descriptor = self.projects.load(&project)?.ok_or_else(|| {
                    RuleError::import(&import.identifier, "no project descriptor found")
                })?;
                let rules = descriptor.default_rules_path(&project).ok_or_else(|| {
                    RuleError::import(&import.identifier, "project declares no default rules")
                })?;
                let rules = normalize_lexically(&rules);
                if !self.sandbox.is_path_allowed(&rules)? {
                    return Err(RuleError::Disallowed(rules));
                }
                self.expand_nested(&rules, &project, visited, effective, import)
            }
        }
    }

    fn expand_nested(
        &self,
        path: &Path,
        root: &Path,
        visited: &mut VisitedSet,
        effective: usize,
        import: &ImportReference,
    ) -> Result<RuleSet> {
        if visited.contains(path) {
            return Err(RuleError::import(
                &import.identifier,
                "already imported (cycle or duplicate import)",
            ));
        }
        debug!(
            identifier = %import.identifier,
            path = %path.display(),
            root = %root.display(),
            "expanding import"
        );
        self.expand(path, root, visited, Some(effective))
    }
}

fn ruleset_name(import: &ImportReference) -> Result<&str> {
    import
        .ruleset
        .as_deref()
        .ok_or_else(|| RuleError::import(&import.identifier, "missing ruleset name"))
}

/// Exclusions never carry a content directive, not even the file default.
fn own_directive(
    exclude: bool,
    directive: &Option<ContentDirective>,
    default: &Option<ContentDirective>,
) -> Option<ContentDirective> {
    if exclude {
        return None;
    }
    directive.clone().or_else(|| default.clone())
}

fn push(set: &mut RuleSet, pattern: RulePattern, cold: bool) {
    if cold {
        set.cold.push(pattern);
    } else {
        set.hot.push(pattern);
    }
}

fn skip(set: &mut RuleSet, file: &Path, line: &ParsedLine, reason: String) {
    warn!(
        file = %file.display(),
        line = line.line,
        text = %line.text,
        %reason,
        "rule skipped"
    );
    set.skipped
        .push(SkippedRule::new(PathBuf::from(file), line.line, &line.text, reason));
}

/// Give imported inclusions without a directive the importer's directive.
fn inherit_directive(set: &mut RuleSet, directive: &ContentDirective) {
    for pattern in set.hot.iter_mut().chain(set.cold.iter_mut()) {
        if !pattern.is_exclusion && pattern.directive.is_none() {
            pattern.directive = Some(directive.clone());
        }
    }
}
