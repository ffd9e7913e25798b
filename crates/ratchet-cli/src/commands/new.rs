//! New command implementation - scaffolds the next numbered migration file

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::{GlobalArgs, NewArgs};
use crate::context::RuntimeContext;

/// Execute the new command
pub(crate) fn execute(args: &NewArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let path = create(args, &ctx)?;
    println!("Created {}", path.display());
    Ok(())
}

pub(crate) fn create(args: &NewArgs, ctx: &RuntimeContext) -> Result<PathBuf> {
    if !args.name.chars().any(|c| c.is_ascii_alphanumeric()) {
        anyhow::bail!(
            "Invalid migration name '{}': must contain a letter or digit",
            args.name
        );
    }

    let dir = ctx.migrations_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let migrations = ctx.migrations()?;
    let path = dir.join(migrations.next_file_name(&args.name));
    if path.exists() {
        anyhow::bail!("Migration file '{}' already exists", path.display());
    }

    let content = format!(
        "-- {}\n-- Runs inside the migration transaction; do not add BEGIN/COMMIT.\n\n",
        args.name.trim()
    );
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[path = "new_test.rs"]
mod tests;
