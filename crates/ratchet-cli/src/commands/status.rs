//! Status command implementation

use anyhow::{Context, Result};
use ratchet_migrate::{MigrationStatus, SchemaVersion, StatusKind};
use serde::Serialize;

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::context::RuntimeContext;

/// Status report for JSON output
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    backend: String,
    #[serde(flatten)]
    status: MigrationStatus,
    state: StatusKind,
    pending: Vec<PendingMigration>,
}

#[derive(Debug, Serialize)]
struct PendingMigration {
    version: SchemaVersion,
    name: String,
}

/// Execute the status command
pub(crate) fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let report = build_report(&ctx)?;

    match args.output {
        StatusOutput::Json => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize status report")?;
            println!("{}", json);
        }
        StatusOutput::Text => print_text(&report),
    }
    Ok(())
}

pub(crate) fn build_report(ctx: &RuntimeContext) -> Result<StatusReport> {
    let migrations = ctx.migrations()?;
    let manager = ctx.manager(migrations.clone())?;
    let db = ctx.open_database()?;

    let status = manager
        .status(db.as_ref())
        .context("Failed to read schema version")?;
    let pending = migrations
        .pending(status.database_version)
        .iter()
        .map(|m| PendingMigration {
            version: m.version,
            name: m.name.clone(),
        })
        .collect();

    Ok(StatusReport {
        backend: ctx.config.database.backend.to_string(),
        status,
        state: status.kind(),
        pending,
    })
}

fn print_text(report: &StatusReport) {
    println!("Backend:             {}", report.backend);
    println!("Database version:    {}", report.status.database_version);
    println!("Application version: {}", report.status.application_version);

    match report.state {
        StatusKind::UpToDate => println!("Status:              up to date"),
        StatusKind::Pending => {
            println!(
                "Status:              {} pending migration{}",
                report.pending.len(),
                if report.pending.len() == 1 { "" } else { "s" }
            );
            for m in &report.pending {
                println!("  {:03}  {}", m.version.get(), m.name);
            }
        }
        StatusKind::DatabaseNewer => {
            println!("Status:              database is newer than the available migrations")
        }
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
