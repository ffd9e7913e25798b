//! Schema versioning and locking on SQLite's `user_version` header field.

use crate::error::{MigrateError, MigrateResult, MigrationStep};
use crate::store::VersionStore;
use crate::transaction::{run_control_statement, MigrationTransaction, TransactionCoordinator};
use crate::version::SchemaVersion;
use ratchet_db::{Database, DbError};

/// Version store and transaction coordinator for SQLite.
///
/// The version lives in the per-database `user_version` header field (see
/// `PRAGMA user_version`), so no table is created. Nothing else may read or
/// write `user_version` on a database managed this way.
///
/// Locking uses `BEGIN EXCLUSIVE`, which SQLite enforces across processes.
/// A contended lock blocks for the handle's busy timeout and then fails
/// with [`MigrateError::LockTimeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteMigrationManager;

impl SqliteMigrationManager {
    pub fn new() -> Self {
        Self
    }
}

/// `user_version` is a signed 32-bit header field.
const MAX_USER_VERSION: u32 = i32::MAX as u32;

impl TransactionCoordinator for SqliteMigrationManager {
    fn begin_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, "BEGIN EXCLUSIVE TRANSACTION", MigrationStep::AcquireLock)
    }

    fn commit_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, "COMMIT TRANSACTION", MigrationStep::Commit)
    }

    fn rollback_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, "ROLLBACK TRANSACTION", MigrationStep::Rollback)
    }
}

impl VersionStore for SqliteMigrationManager {
    fn current_version(&self, db: &dyn Database) -> MigrateResult<SchemaVersion> {
        let row = db
            .query_row("PRAGMA user_version", &[])
            .map_err(MigrateError::VersionRead)?;
        match row.and_then(|r| r.first().and_then(|v| v.as_i64())) {
            Some(raw) => SchemaVersion::from_stored(raw),
            None => Ok(SchemaVersion::ZERO),
        }
    }

    fn set_version(
        &self,
        tx: &MigrationTransaction<'_>,
        version: SchemaVersion,
    ) -> MigrateResult<()> {
        let db = tx.ensure_active()?;
        if version.get() > MAX_USER_VERSION {
            return Err(MigrateError::VersionWrite {
                version,
                source: DbError::execution(format!(
                    "user_version cannot hold values above {MAX_USER_VERSION}"
                )),
            });
        }
        // PRAGMA arguments cannot be bound, the value is a validated integer.
        db.execute_batch(&format!("PRAGMA user_version = {}", version.get()))
            .map_err(|source| MigrateError::VersionWrite { version, source })
    }
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;
