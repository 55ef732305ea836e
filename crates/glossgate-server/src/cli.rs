use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::service::Evaluator;

#[derive(Debug, Parser)]
#[command(name = "glossgate", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update the permission tables.
    Migrate,
    /// Decide a single request and print `allowed` or `denied`.
    Check {
        #[arg(long)]
        session: Option<i64>,
        /// Desktop session cookie, used when desktop mode is enabled.
        #[arg(long)]
        cookie: Option<String>,
        #[arg(long)]
        action: String,
        #[arg(long)]
        subject: String,
        /// `OBJECT`, `CLIENT:OBJECT`, or `none` for a creation check.
        #[arg(long, default_value = "none")]
        target: String,
        /// Overrides `engine.evaluator` from the config.
        #[arg(long, value_enum)]
        evaluator: Option<Evaluator>,
    },
    /// Print the principal tokens a session holds.
    Principals {
        #[arg(long)]
        session: i64,
        #[arg(long)]
        subject: Option<String>,
    },
}
