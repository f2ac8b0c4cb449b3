mod agents;
mod cli;
mod config;
mod detection;
mod error;
mod plan;
mod registry;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands, ReplaceCommand};
use colored::Colorize;
use config::ReplacementEntry;
use std::process;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DEPSHIFT_LOG";

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Plan { plan } => workflow::execute_plan(&cli.path, config, &plan),
        Commands::Check { plan } => workflow::execute_check(&cli.path, config, &plan),
        Commands::Apply {
            plan,
            interactive,
            commit,
            no_escalation,
            json,
        } => workflow::execute_apply(
            &cli.path,
            config,
            &plan,
            interactive,
            commit,
            no_escalation,
            json,
        ),
        Commands::Scan {
            output,
            include_prerelease,
        } => workflow::execute_scan(&cli.path, config, output.as_deref(), !include_prerelease),
        Commands::Replace {
            action:
                ReplaceCommand::Add {
                    package,
                    with,
                    version,
                    manual_review,
                    notes,
                },
        } => workflow::execute_replace_add(
            &cli.path,
            config,
            ReplacementEntry {
                package,
                replacement: with,
                version,
                requires_manual_review: manual_review,
                notes,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
