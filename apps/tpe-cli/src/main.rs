//! # tpe-cli
//!
//! Offline checker for trust policy files.
//!
//! - `tpe validate <policy>` — schema-validate a JSON/YAML policy
//! - `tpe lint <policy>` — analysis and consistency checks
//! - `tpe eval <policy> <context>` — evaluate a request context against a policy
//!
//! Results are printed to stdout as JSON; diagnostics go to stderr.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Trust policy checker — validate, lint and evaluate policy files.
#[derive(Parser)]
#[command(name = "tpe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a policy file against the schema.
    Validate {
        /// Policy file (.json, .yaml or .yml).
        policy: PathBuf,
    },
    /// Report analysis findings and consistency errors for a policy file.
    Lint {
        /// Policy file (.json, .yaml or .yml).
        policy: PathBuf,
    },
    /// Evaluate a request context against a policy.
    Eval {
        /// Policy file (.json, .yaml or .yml).
        policy: PathBuf,
        /// Evaluation context file (.json, .yaml or .yml).
        context: PathBuf,
        /// Include the per-rule evaluation trace in the result.
        #[arg(long)]
        debug: bool,
        /// Evaluator config (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tpe_policy=info".parse()?)
                .add_directive("tpe_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Validate { policy } => commands::validate::execute(policy),
        Commands::Lint { policy } => commands::lint::execute(policy),
        Commands::Eval {
            policy,
            context,
            debug,
            config,
        } => commands::eval::execute(policy, context, *debug, config.as_deref()),
    }
}
