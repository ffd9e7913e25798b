//! A ready-made delegate built from numbered SQL scripts.
//!
//! Scripts are applied one version at a time, in order, inside the
//! manager's migration transaction. They can be declared in code or loaded
//! from a directory of files named `NNN_description.sql`.

use crate::delegate::{DelegateError, MigrationDelegate};
use crate::error::{MigrateError, MigrateResult};
use crate::version::SchemaVersion;
use ratchet_db::{Database, DbError};
use std::path::Path;
use thiserror::Error;

/// One schema change, taking a database from `version - 1` to `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Sequential version number (1-based).
    pub version: SchemaVersion,
    /// Short human-readable description.
    pub name: String,
    /// SQL to execute; may hold several statements.
    pub sql: String,
}

impl Migration {
    pub fn new(version: u32, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version: SchemaVersion::new(version),
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Failure of a single migration script.
#[derive(Error, Debug)]
pub enum SqlMigrationError {
    #[error("migration {version} ({name}) failed: {source}")]
    StepFailed {
        version: SchemaVersion,
        name: String,
        #[source]
        source: DbError,
    },

    #[error("no migration script for version {0}")]
    MissingStep(SchemaVersion),
}

/// Ordered, gap-free set of migration scripts.
#[derive(Debug, Clone, Default)]
pub struct SqlMigrations {
    migrations: Vec<Migration>,
}

impl SqlMigrations {
    /// Build a set from scripts in any order.
    ///
    /// Versions must run 1, 2, 3, ... without gaps or duplicates.
    pub fn new(mut migrations: Vec<Migration>) -> MigrateResult<Self> {
        migrations.sort_by_key(|m| m.version);
        for (idx, migration) in migrations.iter().enumerate() {
            let expected = idx as u64 + 1;
            if u64::from(migration.version.get()) != expected {
                return Err(MigrateError::InvalidMigrations(format!(
                    "expected version {expected} but found {} ({})",
                    migration.version, migration.name
                )));
            }
        }
        Ok(Self { migrations })
    }

    /// Load every `NNN_description.sql` file in `dir`.
    ///
    /// Files without a `.sql` extension are ignored. A missing directory is
    /// treated as an empty set.
    pub fn from_dir(dir: &Path) -> MigrateResult<Self> {
        if !dir.exists() {
            log::debug!("Migration directory {} does not exist", dir.display());
            return Ok(Self::default());
        }
        let io_err = |source| MigrateError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut migrations = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (version, name) = parse_file_stem(stem)?;
            let sql = std::fs::read_to_string(&path).map_err(|source| MigrateError::Io {
                path: path.clone(),
                source,
            })?;
            migrations.push(Migration::new(version, name, sql));
        }
        Self::new(migrations)
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Scripts that take a database from `from` up to the latest version.
    pub fn pending(&self, from: SchemaVersion) -> &[Migration] {
        let applied = (from.get() as usize).min(self.migrations.len());
        &self.migrations[applied..]
    }

    /// File name for a new script following the current last one.
    pub fn next_file_name(&self, description: &str) -> String {
        let slug: String = description
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{:03}_{}.sql", self.migrations.len() + 1, slug)
    }
}

/// Split `001_create_users` into `(1, "create_users")`.
fn parse_file_stem(stem: &str) -> MigrateResult<(u32, String)> {
    let (number, name) = stem.split_once('_').unwrap_or((stem, ""));
    let version = number.parse::<u32>().map_err(|_| {
        MigrateError::InvalidMigrations(format!(
            "migration file '{stem}.sql' must start with a version number"
        ))
    })?;
    Ok((version, name.to_string()))
}

impl MigrationDelegate for SqlMigrations {
    fn current_version(&self) -> SchemaVersion {
        self.migrations
            .last()
            .map_or(SchemaVersion::ZERO, |m| m.version)
    }

    fn migrate(
        &self,
        db: &dyn Database,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<(), DelegateError> {
        let mut applied = from;
        for migration in self.pending(from) {
            if migration.version > to {
                break;
            }
            log::debug!(
                "Applying migration v{:03} ({})",
                migration.version.get(),
                migration.name
            );
            db.execute_batch(&migration.sql)
                .map_err(|source| SqlMigrationError::StepFailed {
                    version: migration.version,
                    name: migration.name.clone(),
                    source,
                })?;
            applied = migration.version;
        }
        if applied < to {
            let missing = applied.next().unwrap_or(to);
            return Err(SqlMigrationError::MissingStep(missing).into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sql_migrations_test.rs"]
mod tests;
