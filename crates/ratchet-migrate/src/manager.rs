//! The migration state machine.
//!
//! A run moves through `Idle → LockAcquired → VersionRead → Migrating →
//! VersionWritten → Committed`. Any failure rolls the transaction back and
//! releases the lock before the error is returned, so the stored version
//! and the schema always change together or not at all.

use crate::delegate::MigrationDelegate;
use crate::error::{MigrateError, MigrateResult};
use crate::sqlite::SqliteMigrationManager;
use crate::store::VersionStore;
use crate::table::TableMigrationManager;
use crate::transaction::{MigrationTransaction, TransactionCoordinator};
use crate::version::SchemaVersion;
use ratchet_db::Database;
use serde::Serialize;
use std::cmp::Ordering;

/// Drives migrations for one application.
///
/// Holds no per-database state, so one manager can migrate many databases,
/// including concurrently from several threads. Attempts against the same
/// database are serialized by the coordinator's lock.
pub struct MigrationManager {
    coordinator: Box<dyn TransactionCoordinator>,
    versions: Box<dyn VersionStore>,
    delegate: Box<dyn MigrationDelegate>,
}

impl MigrationManager {
    pub fn new(
        coordinator: impl TransactionCoordinator + 'static,
        versions: impl VersionStore + 'static,
        delegate: impl MigrationDelegate + 'static,
    ) -> Self {
        Self {
            coordinator: Box::new(coordinator),
            versions: Box::new(versions),
            delegate: Box::new(delegate),
        }
    }

    /// Manager using SQLite's `user_version` and `BEGIN EXCLUSIVE` locking.
    pub fn sqlite(delegate: impl MigrationDelegate + 'static) -> Self {
        Self::new(SqliteMigrationManager, SqliteMigrationManager, delegate)
    }

    /// Manager using a version table and row lock; works on any backend.
    pub fn table(manager: TableMigrationManager, delegate: impl MigrationDelegate + 'static) -> Self {
        Self::new(manager.clone(), manager, delegate)
    }

    pub fn delegate(&self) -> &dyn MigrationDelegate {
        self.delegate.as_ref()
    }

    /// Bring `db` up to the delegate's version.
    ///
    /// Returns `true` when migrations were applied and `false` when the
    /// database was already current. The handle is borrowed, never closed.
    pub fn migrate(&self, db: &dyn Database) -> MigrateResult<bool> {
        log::debug!("Starting migration run on {} database", db.db_type());
        let mut tx = MigrationTransaction::begin(self.coordinator.as_ref(), db)?;

        match self.run(&tx) {
            Ok(migrated) => {
                tx.commit()?;
                Ok(migrated)
            }
            Err(err) => {
                log::warn!("Migration failed, rolling back: {err}");
                if let Err(rollback_err) = tx.rollback() {
                    log::warn!("Rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    fn run(&self, tx: &MigrationTransaction<'_>) -> MigrateResult<bool> {
        let db = tx.database();
        let current = self.versions.current_version(db)?;
        let target = self.delegate.current_version();
        log::debug!("Database at version {current}, application expects {target}");

        match current.cmp(&target) {
            Ordering::Equal => {
                log::debug!("Schema is up to date");
                Ok(false)
            }
            Ordering::Greater => Err(MigrateError::SchemaNewerThanApplication {
                database: current,
                application: target,
            }),
            Ordering::Less => {
                self.delegate
                    .migrate(db, current, target)
                    .map_err(|source| MigrateError::Delegate {
                        from: current,
                        to: target,
                        source,
                    })?;
                self.versions.set_version(tx, target)?;
                log::info!("Migrated {} database from version {current} to {target}", db.db_type());
                Ok(true)
            }
        }
    }

    /// Compare the stored version with the application's, without locking
    /// or writing anything.
    pub fn status(&self, db: &dyn Database) -> MigrateResult<MigrationStatus> {
        Ok(MigrationStatus {
            database_version: self.versions.current_version(db)?,
            application_version: self.delegate.current_version(),
        })
    }
}

/// Where a database stands relative to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    UpToDate,
    Pending,
    DatabaseNewer,
}

/// Read-only snapshot returned by [`MigrationManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub database_version: SchemaVersion,
    pub application_version: SchemaVersion,
}

impl MigrationStatus {
    pub fn kind(&self) -> StatusKind {
        match self.database_version.cmp(&self.application_version) {
            Ordering::Equal => StatusKind::UpToDate,
            Ordering::Less => StatusKind::Pending,
            Ordering::Greater => StatusKind::DatabaseNewer,
        }
    }

    /// Number of versions the database is behind.
    pub fn pending(&self) -> u32 {
        self.application_version
            .get()
            .saturating_sub(self.database_version.get())
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
