//! Schema versioning and locking on an ordinary single-row table.

use crate::error::{MigrateError, MigrateResult, MigrationStep};
use crate::store::VersionStore;
use crate::transaction::{run_control_statement, MigrationTransaction, TransactionCoordinator};
use crate::version::SchemaVersion;
use ratchet_db::{Database, DbError, Value};

/// Default name of the version table.
pub const DEFAULT_VERSION_TABLE: &str = "ratchet_schema_version";

/// Version store and transaction coordinator for backends without a native
/// version counter.
///
/// The version is kept in a one-row table, created inside the first
/// migration's transaction. Until that commits,
/// [`current_version`](VersionStore::current_version) reports zero.
///
/// The migration lock is a row lock: beginning a migration updates the
/// row's lock epoch inside the new transaction. On DuckDB a second writer
/// hits a transaction conflict straight away and fails fast, on the row or,
/// for a fresh database, on the table being created. On SQLite it
/// waits for the handle's busy timeout. Both surface as
/// [`MigrateError::LockTimeout`].
#[derive(Debug, Clone)]
pub struct TableMigrationManager {
    table: String,
}

impl Default for TableMigrationManager {
    fn default() -> Self {
        Self {
            table: DEFAULT_VERSION_TABLE.to_string(),
        }
    }
}

impl TableMigrationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom table name, optionally schema-qualified.
    pub fn with_table(table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(MigrateError::Precondition(format!(
                "invalid version table name '{table}'"
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the version table and its row if missing, then bump the lock
    /// epoch. Runs inside the migration transaction, so a rolled back first
    /// migration leaves no table behind.
    fn claim_lock(&self, db: &dyn Database) -> Result<(), DbError> {
        if !db.relation_exists(&self.table)? {
            db.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                     id         INTEGER PRIMARY KEY,
                     version    BIGINT NOT NULL,
                     lock_epoch BIGINT NOT NULL
                 )",
                self.table
            ))?;
        }
        let existing = db.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = 1", self.table),
            &[],
        )?;
        if existing.and_then(|r| r.first().and_then(Value::as_i64)) != Some(1) {
            db.execute(
                &format!(
                    "INSERT INTO {} (id, version, lock_epoch) VALUES (1, 0, 0) ON CONFLICT DO NOTHING",
                    self.table
                ),
                &[],
            )
            .map_err(row_insert_conflict)?;
        }

        let claimed = db.execute(
            &format!(
                "UPDATE {} SET lock_epoch = lock_epoch + 1 WHERE id = 1",
                self.table
            ),
            &[],
        )?;
        if claimed != 1 {
            return Err(DbError::Internal(format!(
                "version row missing from {}",
                self.table
            )));
        }
        Ok(())
    }
}

/// SQLite takes its write lock at `BEGIN IMMEDIATE`, where a waiting
/// connection honours the busy timeout. DuckDB has a single `BEGIN`.
fn begin_statement(db: &dyn Database) -> &'static str {
    if db.db_type() == "sqlite" {
        "BEGIN IMMEDIATE TRANSACTION"
    } else {
        "BEGIN TRANSACTION"
    }
}

/// A duplicate key on the version row means a concurrent migration
/// inserted it first and still holds it.
fn row_insert_conflict(err: DbError) -> DbError {
    match err {
        DbError::ExecutionError {
            message,
            vendor_code,
            query,
        } if message.contains("Duplicate key") || message.contains("Constraint Error") => {
            DbError::Busy {
                message,
                vendor_code,
                query,
            }
        }
        other => other,
    }
}

/// Identifiers are interpolated into SQL, so only plain (optionally
/// dotted) names are accepted.
fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn lock_error(source: DbError) -> MigrateError {
    if source.is_busy() {
        MigrateError::LockTimeout(source)
    } else {
        MigrateError::Transaction {
            step: MigrationStep::AcquireLock,
            source,
        }
    }
}

impl TransactionCoordinator for TableMigrationManager {
    fn begin_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, begin_statement(db), MigrationStep::AcquireLock)?;
        if let Err(source) = self.claim_lock(db) {
            if let Err(e) = db.execute_batch("ROLLBACK") {
                log::warn!("Rollback after failed lock claim failed: {e}");
            }
            return Err(lock_error(source));
        }
        Ok(())
    }

    fn commit_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, "COMMIT", MigrationStep::Commit)
    }

    fn rollback_migration(&self, db: &dyn Database) -> MigrateResult<()> {
        run_control_statement(db, "ROLLBACK", MigrationStep::Rollback)
    }
}

impl VersionStore for TableMigrationManager {
    fn current_version(&self, db: &dyn Database) -> MigrateResult<SchemaVersion> {
        if !db
            .relation_exists(&self.table)
            .map_err(MigrateError::VersionRead)?
        {
            return Ok(SchemaVersion::ZERO);
        }
        let row = db
            .query_row(
                &format!("SELECT version FROM {} WHERE id = 1", self.table),
                &[],
            )
            .map_err(MigrateError::VersionRead)?;
        match row.and_then(|r| r.first().and_then(Value::as_i64)) {
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
        let updated = db
            .execute(
                &format!("UPDATE {} SET version = ? WHERE id = 1", self.table),
                &[Value::from(version.get())],
            )
            .map_err(|source| MigrateError::VersionWrite { version, source })?;
        if updated != 1 {
            return Err(MigrateError::VersionWrite {
                version,
                source: DbError::Internal(format!("version row missing from {}", self.table)),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
