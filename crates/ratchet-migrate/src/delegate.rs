//! The caller-supplied migration logic.

use crate::version::SchemaVersion;
use ratchet_db::Database;

/// Error type returned by a [`MigrationDelegate`].
///
/// Surfaced unchanged as the source of [`MigrateError::Delegate`](crate::MigrateError::Delegate).
pub type DelegateError = Box<dyn std::error::Error + Send + Sync>;

/// Application code that knows how to bring a database to its schema version.
///
/// The manager calls [`migrate`](MigrationDelegate::migrate) at most once per
/// run, spanning the whole delta from the stored version to
/// [`current_version`](MigrationDelegate::current_version). The call happens
/// inside the migration transaction, so the delegate must issue its
/// statements through the `db` handle it is given and must not commit or
/// roll back itself. After a failed run nothing it did survives, and a later
/// run calls it again from the same starting version.
pub trait MigrationDelegate: Send + Sync {
    /// The schema version this application build expects. Must not do I/O.
    fn current_version(&self) -> SchemaVersion;

    /// Apply every schema change needed to move from `from` to `to`.
    fn migrate(
        &self,
        db: &dyn Database,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<(), DelegateError>;
}

impl<D: MigrationDelegate + ?Sized> MigrationDelegate for Box<D> {
    fn current_version(&self) -> SchemaVersion {
        (**self).current_version()
    }

    fn migrate(
        &self,
        db: &dyn Database,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<(), DelegateError> {
        (**self).migrate(db, from, to)
    }
}

impl<D: MigrationDelegate + ?Sized> MigrationDelegate for std::sync::Arc<D> {
    fn current_version(&self) -> SchemaVersion {
        (**self).current_version()
    }

    fn migrate(
        &self,
        db: &dyn Database,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<(), DelegateError> {
        (**self).migrate(db, from, to)
    }
}
