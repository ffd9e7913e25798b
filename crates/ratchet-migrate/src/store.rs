//! Persisted schema version contract.

use crate::error::MigrateResult;
use crate::transaction::MigrationTransaction;
use crate::version::SchemaVersion;
use ratchet_db::Database;

/// Reads and writes the schema version persisted inside a database.
///
/// Implementations hold no per-database state; everything they need comes
/// from the handle passed to each call.
pub trait VersionStore: Send + Sync {
    /// The persisted version, or [`SchemaVersion::ZERO`] for a database that
    /// has never been migrated. Must not require any pre-existing table.
    fn current_version(&self, db: &dyn Database) -> MigrateResult<SchemaVersion>;

    /// Persist `version` as part of `tx`.
    ///
    /// Fails with [`MigrateError::Precondition`](crate::MigrateError::Precondition)
    /// when `tx` has already been committed or rolled back.
    fn set_version(&self, tx: &MigrationTransaction<'_>, version: SchemaVersion)
        -> MigrateResult<()>;
}
