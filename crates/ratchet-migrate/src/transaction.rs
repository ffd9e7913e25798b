//! Migration transactions and the locking contract behind them.

use crate::error::{MigrateError, MigrateResult, MigrationStep};
use ratchet_db::Database;

/// Starts, commits, and rolls back migration transactions.
///
/// `begin_migration` must take a lock scoped to the database itself, not to
/// the calling process, so only one migration proceeds at a time. Whether a
/// contended lock blocks or fails fast is up to the backend; either way
/// contention surfaces as [`MigrateError::LockTimeout`].
///
/// Callers normally go through [`MigrationTransaction`], which pairs every
/// successful begin with exactly one commit or rollback.
pub trait TransactionCoordinator: Send + Sync {
    /// Acquire the migration lock and start a transaction on `db`.
    fn begin_migration(&self, db: &dyn Database) -> MigrateResult<()>;

    /// Commit the transaction on `db` and release the lock.
    fn commit_migration(&self, db: &dyn Database) -> MigrateResult<()>;

    /// Discard every write made since `begin_migration` and release the lock.
    fn rollback_migration(&self, db: &dyn Database) -> MigrateResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// An in-flight migration transaction holding the migration lock.
///
/// Dropping an active transaction rolls it back, so the lock is released on
/// every exit path, unwinding included.
pub struct MigrationTransaction<'a> {
    db: &'a dyn Database,
    coordinator: &'a dyn TransactionCoordinator,
    state: TxState,
}

impl<'a> MigrationTransaction<'a> {
    /// Acquire the migration lock on `db` through `coordinator`.
    ///
    /// On failure nothing has been started and there is nothing to release.
    pub fn begin(
        coordinator: &'a dyn TransactionCoordinator,
        db: &'a dyn Database,
    ) -> MigrateResult<Self> {
        coordinator.begin_migration(db)?;
        log::debug!("Migration lock acquired on {} database", db.db_type());
        Ok(Self {
            db,
            coordinator,
            state: TxState::Active,
        })
    }

    /// The handle this transaction runs on.
    pub fn database(&self) -> &'a dyn Database {
        self.db
    }

    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// The handle, provided the transaction is still open.
    pub fn ensure_active(&self) -> MigrateResult<&'a dyn Database> {
        match self.state {
            TxState::Active => Ok(self.db),
            TxState::Committed => Err(MigrateError::Precondition(
                "migration transaction already committed".to_string(),
            )),
            TxState::RolledBack => Err(MigrateError::Precondition(
                "migration transaction already rolled back".to_string(),
            )),
        }
    }

    /// Commit and release the lock.
    ///
    /// A failed commit rolls the transaction back before returning the
    /// commit error.
    pub fn commit(mut self) -> MigrateResult<()> {
        self.ensure_active()?;
        match self.coordinator.commit_migration(self.db) {
            Ok(()) => {
                self.state = TxState::Committed;
                log::debug!("Migration transaction committed");
                Ok(())
            }
            Err(commit_err) => {
                if let Err(rollback_err) = self.rollback() {
                    log::warn!("Rollback after failed commit also failed: {rollback_err}");
                }
                Err(commit_err)
            }
        }
    }

    /// Roll back and release the lock. Has no effect once the transaction
    /// is no longer active.
    pub fn rollback(&mut self) -> MigrateResult<()> {
        if self.state != TxState::Active {
            return Ok(());
        }
        self.state = TxState::RolledBack;
        log::debug!("Rolling back migration transaction");
        self.coordinator.rollback_migration(self.db)
    }
}

impl Drop for MigrationTransaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            log::warn!("Migration transaction dropped while active, rolling back");
            if let Err(e) = self.rollback() {
                log::warn!("Rollback of abandoned migration transaction failed: {e}");
            }
        }
    }
}

/// Run a `BEGIN`/`COMMIT`/`ROLLBACK` style statement, mapping failures to
/// the step they belong to.
pub(crate) fn run_control_statement(
    db: &dyn Database,
    sql: &str,
    step: MigrationStep,
) -> MigrateResult<()> {
    db.execute_batch(sql).map_err(|source| {
        if step == MigrationStep::AcquireLock && source.is_busy() {
            MigrateError::LockTimeout(source)
        } else {
            MigrateError::Transaction { step, source }
        }
    })
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod tests;
