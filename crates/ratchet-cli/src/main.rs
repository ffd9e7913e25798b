//! Ratchet CLI - forward-only schema migrations for SQLite and DuckDB

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod context;

use cli::Cli;
use commands::{migrate, new, status};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &cli.command {
        cli::Commands::Migrate(args) => migrate::execute(args, &cli.global),
        cli::Commands::Status(args) => status::execute(args, &cli.global),
        cli::Commands::New(args) => new::execute(args, &cli.global),
    }
}
