use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "depshift",
    about = "Apply npm dependency upgrades in safe, prioritized batches",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub path: String,

    /// Path to a depshift.toml (defaults to <path>/depshift.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the batches a plan file would be applied in
    Plan {
        /// JSON plan file (array of plan items)
        #[arg(long = "plan", value_name = "FILE")]
        plan: PathBuf,
    },

    /// Run detection passes and batching without touching package.json
    Check {
        /// JSON plan file (array of plan items)
        #[arg(long = "plan", value_name = "FILE")]
        plan: PathBuf,
    },

    /// Apply a plan batch by batch with install-flag escalation and rollback
    Apply {
        /// JSON plan file (array of plan items)
        #[arg(long = "plan", value_name = "FILE")]
        plan: PathBuf,

        /// Confirm each batch before it is applied
        #[arg(short, long)]
        interactive: bool,

        /// Commit package.json on a new branch when updates were applied
        #[arg(long)]
        commit: bool,

        /// Try each batch once with a plain install; no flag escalation or fallback
        #[arg(long)]
        no_escalation: bool,

        /// Print the pipeline result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Build a plan file from the npm registry
    Scan {
        /// Where to write the plan (prints to stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Consider pre-release versions (alpha, beta, rc)
        #[arg(long)]
        include_prerelease: bool,
    },

    /// Manage the replacement registry in depshift.toml
    Replace {
        #[command(subcommand)]
        action: ReplaceCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReplaceCommand {
    /// Register a package as superseded
    Add {
        /// Package being replaced
        #[arg(value_name = "PACKAGE")]
        package: String,

        /// Successor package; omit when the package should just be removed
        #[arg(long = "with", value_name = "PACKAGE")]
        with: Option<String>,

        /// Version specifier for the successor (defaults to "latest")
        #[arg(long)]
        version: Option<String>,

        /// Flag the replacement for manual review
        #[arg(long)]
        manual_review: bool,

        /// Free-form notes shown alongside the replacement
        #[arg(long)]
        notes: Option<String>,
    },
}
