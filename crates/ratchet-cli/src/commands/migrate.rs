//! Migrate command implementation

use anyhow::Result;
use ratchet_migrate::{MigrateError, MigrationDelegate, SqlMigrations};

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::context::RuntimeContext;

/// Execute the migrate command
pub(crate) fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    run(args, &ctx)
}

pub(crate) fn run(args: &MigrateArgs, ctx: &RuntimeContext) -> Result<()> {
    let migrations = limit_to(ctx.migrations()?, args.target)?;
    let target = migrations.current_version();
    let manager = ctx.manager(migrations)?;
    let db = ctx.open_database()?;

    let before = manager.status(db.as_ref()).map_err(describe)?;
    if manager.migrate(db.as_ref()).map_err(describe)? {
        println!(
            "Migrated database from version {} to {}",
            before.database_version, target
        );
    } else {
        println!("Database already at version {}", target);
    }
    Ok(())
}

/// Drop scripts above `target`.
fn limit_to(migrations: SqlMigrations, target: Option<u32>) -> Result<SqlMigrations> {
    let Some(target) = target else {
        return Ok(migrations);
    };
    let available = migrations.migrations().len();
    let keep = usize::try_from(target).unwrap_or(usize::MAX);
    if keep > available {
        anyhow::bail!(
            "Target version {} is beyond the latest migration ({})",
            target,
            available
        );
    }
    Ok(SqlMigrations::new(migrations.migrations()[..keep].to_vec())?)
}

fn describe(err: MigrateError) -> anyhow::Error {
    let mut msg = match err.step() {
        Some(step) => format!("Migration failed during {step}"),
        None => "Migration failed".to_string(),
    };
    if err.is_retryable() {
        msg.push_str(" (another migration holds the lock; retry later)");
    }
    anyhow::Error::new(err).context(msg)
}

#[cfg(test)]
#[path = "migrate_test.rs"]
mod tests;
