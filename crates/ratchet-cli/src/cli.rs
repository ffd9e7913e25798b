//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Backend;

/// Ratchet - apply numbered SQL migrations exactly once, in order
#[derive(Parser, Debug)]
#[command(name = "ratchet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to ratchet.yml (default: ./ratchet.yml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the database path
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Override the database backend
    #[arg(short, long, global = true, value_enum)]
    pub backend: Option<Backend>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Migrate(MigrateArgs),

    /// Show database and application schema versions
    Status(StatusArgs),

    /// Create the next numbered migration file
    New(NewArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Stop at this version instead of the latest migration
    #[arg(short, long)]
    pub target: Option<u32>,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Human-readable summary
    Text,
    /// JSON report
    Json,
}

/// Arguments for the new command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Short description, used in the file name
    pub name: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
