mod cli;
mod output;
mod rules_file;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ctxbundle_core::{load_dotenv, Config};
use ctxbundle_rules::{check_interactive_rule, ContextResolver, Tier};

use crate::cli::{CliArgs, Command};
use crate::rules_file::{add_rule, AddOutcome};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => Config::from_env().context("failed to load configuration")?,
    };
    config.log_summary();
    Ok(config)
}

fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let work_dir = match args.work_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let rules_path = |rules: &PathBuf| {
        if rules.is_absolute() {
            rules.clone()
        } else {
            work_dir.join(rules)
        }
    };

    match &args.command {
        Command::Check { rule } => {
            check_interactive_rule(rule)?;
            println!("ok: {}", rule);
        }
        Command::Add { rules, rule, cold } => {
            check_interactive_rule(rule)?;
            let path = rules_path(rules);
            match add_rule(&path, rule, *cold)? {
                AddOutcome::Added => info!(path = %path.display(), rule, "rule added"),
                AddOutcome::AlreadyPresent => {
                    eprintln!("{} already lists {}", path.display(), rule)
                }
            }
        }
        Command::Resolve { rules, cold, json } => {
            let config = load_config(args.config.as_deref())?;
            let resolver = ContextResolver::from_config(&config, &work_dir);
            let ctx = resolver.resolve(rules_path(rules))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&ctx)?);
            } else {
                let tier = if *cold { Tier::Cold } else { Tier::Hot };
                output::write_tier(
                    &mut io::stdout().lock(),
                    &mut io::stderr().lock(),
                    &ctx,
                    tier,
                    resolver.work_dir(),
                )?;
            }
        }
        Command::Explain { rules, json } => {
            let config = load_config(args.config.as_deref())?;
            let resolver = ContextResolver::from_config(&config, &work_dir);
            let report = resolver.explain(rules_path(rules))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::write_report(&mut io::stdout().lock(), &report, resolver.work_dir())?;
            }
        }
    }

    Ok(())
}
