//! Runtime context for CLI commands

use anyhow::{Context, Result};
use ratchet_db::{Database, DuckDbBackend, SqliteBackend};
use ratchet_migrate::{MigrationDelegate, MigrationManager, SqlMigrations, TableMigrationManager};
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;
use crate::config::{Backend, Config, VersionStoreKind};

/// Resolved configuration plus the directory its relative paths hang off
pub(crate) struct RuntimeContext {
    pub config: Config,
    pub root: PathBuf,
}

impl RuntimeContext {
    /// Build the context from global arguments, resolving against the working directory
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        Self::in_dir(args, Path::new("."))
    }

    pub fn in_dir(args: &GlobalArgs, dir: &Path) -> Result<Self> {
        let explicit = args.config.as_deref().map(Path::new);
        let (mut config, root) =
            Config::discover(explicit, dir).context("Failed to load configuration")?;
        config.apply_overrides(args)?;
        Ok(Self { config, root })
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_dir(&self.root)
    }

    /// Load the migration scripts from the configured directory
    pub fn migrations(&self) -> Result<SqlMigrations> {
        let dir = self.migrations_dir();
        SqlMigrations::from_dir(&dir)
            .with_context(|| format!("Failed to load migrations from {}", dir.display()))
    }

    /// Open the configured database
    pub fn open_database(&self) -> Result<Box<dyn Database>> {
        let path = self.config.database_path(&self.root);
        log::debug!("Opening {} database at {}", self.config.database.backend, path);
        let db: Box<dyn Database> = match self.config.database.backend {
            Backend::Sqlite => Box::new(
                SqliteBackend::new(&path)
                    .and_then(|db| db.with_busy_timeout(self.config.busy_timeout()))
                    .with_context(|| format!("Failed to open SQLite database: {path}"))?,
            ),
            Backend::Duckdb => Box::new(
                DuckDbBackend::new(&path)
                    .with_context(|| format!("Failed to open DuckDB database: {path}"))?,
            ),
        };
        Ok(db)
    }

    /// Pair the configured version store with `delegate`
    pub fn manager(&self, delegate: impl MigrationDelegate + 'static) -> Result<MigrationManager> {
        match self.config.version_store {
            VersionStoreKind::Native => Ok(MigrationManager::sqlite(delegate)),
            VersionStoreKind::Table => {
                let table = TableMigrationManager::with_table(&self.config.version_table)
                    .context("Invalid version_table")?;
                Ok(MigrationManager::table(table, delegate))
            }
        }
    }
}
