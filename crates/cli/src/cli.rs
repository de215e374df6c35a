use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resolve rule files into context bundles.
///
/// Rule files list globs, imports and aliases; `ctxbundle` expands them
/// and prints the files that belong to the bundle.
#[derive(Parser, Debug)]
#[command(name = "ctxbundle", about = "Resolve rule files into context bundles")]
pub struct CliArgs {
    /// Working directory relative patterns are resolved against
    #[arg(long, global = true, env = "CTXBUNDLE_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Path to config file (default: ~/.config/ctxbundle/config.toml)
    #[arg(long, global = true, env = "CTXBUNDLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the files selected by a rule file
    Resolve {
        rules: PathBuf,
        /// Print the cold tier instead of the hot tier
        #[arg(long)]
        cold: bool,
        /// Print the full resolution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which rule line decided each file
    Explain {
        rules: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Check a rule against the interactive-rule guard
    Check { rule: String },
    /// Guard a rule, then add it to a rule file
    Add {
        rules: PathBuf,
        rule: String,
        /// Add to the cold tier
        #[arg(long)]
        cold: bool,
    },
}
