//! Connection providers and the provider-based compatibility manager.

use crate::delegate::MigrationDelegate;
use crate::error::{MigrateError, MigrateResult};
use crate::manager::MigrationManager;
use crate::store::VersionStore;
use crate::transaction::TransactionCoordinator;
use ratchet_db::{Database, DbResult, DuckDbBackend, SqliteBackend};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

/// Lends out database connections and takes them back for reuse.
///
/// Implementations must be usable from any thread without external locking.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Database;

    /// Open or reuse a connection.
    fn get_connection(&self) -> DbResult<Self::Connection>;

    /// Return a connection. The provider may close it immediately.
    fn close_connection(&self, connection: Self::Connection);
}

/// Opens a fresh SQLite connection to one database file per request.
#[derive(Debug, Clone)]
pub struct SqliteFileProvider {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: ratchet_db::sqlite::DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl ConnectionProvider for SqliteFileProvider {
    type Connection = SqliteBackend;

    fn get_connection(&self) -> DbResult<SqliteBackend> {
        SqliteBackend::from_path(&self.path)?.with_busy_timeout(self.busy_timeout)
    }

    fn close_connection(&self, connection: SqliteBackend) {
        drop(connection);
    }
}

/// Hands out connections cloned from one shared DuckDB instance.
///
/// DuckDB allows a single read-write process per database file, so all
/// connections for that file have to come from the same instance.
pub struct DuckDbProvider {
    root: DuckDbBackend,
}

impl DuckDbProvider {
    pub fn new(root: DuckDbBackend) -> Self {
        Self { root }
    }

    /// The instance connections are cloned from.
    pub fn root(&self) -> &DuckDbBackend {
        &self.root
    }
}

impl ConnectionProvider for DuckDbProvider {
    type Connection = DuckDbBackend;

    fn get_connection(&self) -> DbResult<DuckDbBackend> {
        self.root.try_clone()
    }

    fn close_connection(&self, connection: DuckDbBackend) {
        drop(connection);
    }
}

/// Migration manager that obtains its own connection from a provider.
///
/// Kept for callers written against the provider-based API. Every run
/// borrows one connection, hands it to [`MigrationManager::migrate`], and
/// returns it to the provider afterwards, whatever the outcome.
pub struct ProvidedMigrationManager<P: ConnectionProvider> {
    provider: P,
    manager: MigrationManager,
}

impl<P: ConnectionProvider> ProvidedMigrationManager<P> {
    #[deprecated(note = "build a MigrationManager and pass a database handle to migrate()")]
    pub fn new(
        provider: P,
        coordinator: impl TransactionCoordinator + 'static,
        versions: impl VersionStore + 'static,
        delegate: impl MigrationDelegate + 'static,
    ) -> Self {
        Self {
            provider,
            manager: MigrationManager::new(coordinator, versions, delegate),
        }
    }

    #[deprecated(note = "use MigrationManager::migrate with a database handle")]
    pub fn migrate(&self) -> MigrateResult<bool> {
        let connection = self
            .provider
            .get_connection()
            .map_err(MigrateError::Connection)?;
        // The connection goes back to the provider even if the delegate panics
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.manager.migrate(&connection)));
        self.provider.close_connection(connection);
        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
