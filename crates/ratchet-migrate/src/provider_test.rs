#![allow(deprecated)]

use super::*;
use crate::sql_migrations::{Migration, SqlMigrations};
use crate::sqlite::SqliteMigrationManager;
use crate::table::TableMigrationManager;
use crate::version::SchemaVersion;
use ratchet_db::DbError;
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Helpers ────────────────────────────────────────────────────────────

fn migrations() -> SqlMigrations {
    SqlMigrations::new(vec![
        Migration::new(1, "users", "CREATE TABLE users (id INTEGER PRIMARY KEY)"),
        Migration::new(2, "posts", "CREATE TABLE posts (id INTEGER PRIMARY KEY)"),
    ])
    .unwrap()
}

fn broken_migrations() -> SqlMigrations {
    SqlMigrations::new(vec![Migration::new(1, "broken", "CREATE TABLE")]).unwrap()
}

/// Wraps a provider and counts loans and returns.
struct CountingProvider<P> {
    inner: P,
    lent: AtomicUsize,
    returned: AtomicUsize,
}

impl<P> CountingProvider<P> {
    fn new(inner: P) -> Self {
        Self {
            inner,
            lent: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
        }
    }

    fn counts(&self) -> (usize, usize) {
        (
            self.lent.load(Ordering::SeqCst),
            self.returned.load(Ordering::SeqCst),
        )
    }
}

impl<P: ConnectionProvider> ConnectionProvider for CountingProvider<P> {
    type Connection = P::Connection;

    fn get_connection(&self) -> DbResult<P::Connection> {
        let conn = self.inner.get_connection()?;
        self.lent.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    fn close_connection(&self, connection: P::Connection) {
        self.returned.fetch_add(1, Ordering::SeqCst);
        self.inner.close_connection(connection);
    }
}

struct UnreachableProvider;

impl ConnectionProvider for UnreachableProvider {
    type Connection = SqliteBackend;

    fn get_connection(&self) -> DbResult<SqliteBackend> {
        Err(DbError::ConnectionError("server unreachable".into()))
    }

    fn close_connection(&self, _connection: SqliteBackend) {
        panic!("nothing was lent");
    }
}

// ── SQLite file provider ───────────────────────────────────────────────

#[test]
fn provided_manager_migrates_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite");
    let provider = CountingProvider::new(SqliteFileProvider::new(&path));
    let manager = ProvidedMigrationManager::new(
        provider,
        SqliteMigrationManager,
        SqliteMigrationManager,
        migrations(),
    );

    assert!(manager.migrate().unwrap());
    assert!(!manager.migrate().unwrap());
    assert_eq!(manager.provider().counts(), (2, 2));

    let db = SqliteBackend::from_path(&path).unwrap();
    assert!(db.relation_exists("posts").unwrap());
    assert_eq!(
        SqliteMigrationManager.current_version(&db).unwrap(),
        SchemaVersion::new(2)
    );
}

#[test]
fn connection_is_returned_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let provider = CountingProvider::new(SqliteFileProvider::new(dir.path().join("bad.sqlite")));
    let manager = ProvidedMigrationManager::new(
        provider,
        SqliteMigrationManager,
        SqliteMigrationManager,
        broken_migrations(),
    );

    let err = manager.migrate().unwrap_err();
    assert!(matches!(err, MigrateError::Delegate { .. }), "got {err:?}");
    assert_eq!(manager.provider().counts(), (1, 1));
}

#[test]
fn unreachable_provider_is_connection_error() {
    let manager = ProvidedMigrationManager::new(
        UnreachableProvider,
        SqliteMigrationManager,
        SqliteMigrationManager,
        migrations(),
    );

    let err = manager.migrate().unwrap_err();
    assert!(matches!(err, MigrateError::Connection(_)), "got {err:?}");
    assert_eq!(err.step(), Some(crate::error::MigrationStep::Connect));
}

// ── DuckDB provider ────────────────────────────────────────────────────

#[test]
fn provided_manager_migrates_duckdb() {
    let provider = DuckDbProvider::new(DuckDbBackend::in_memory().unwrap());
    let table = TableMigrationManager::new();
    let manager = ProvidedMigrationManager::new(provider, table.clone(), table.clone(), migrations());

    assert!(manager.migrate().unwrap());

    let root = manager.provider().root();
    assert!(root.relation_exists("users").unwrap());
    assert_eq!(
        table.current_version(root).unwrap(),
        SchemaVersion::new(2)
    );
}

#[test]
fn provided_and_direct_paths_agree() {
    let provider = DuckDbProvider::new(DuckDbBackend::in_memory().unwrap());
    let table = TableMigrationManager::new();
    let legacy = ProvidedMigrationManager::new(provider, table.clone(), table.clone(), migrations());
    legacy.migrate().unwrap();

    // The primary path sees the same state and has nothing left to do
    let direct = MigrationManager::table(table, migrations());
    assert!(!direct.migrate(legacy.provider().root()).unwrap());
}

/// Delegate whose migration step panics.
struct PanickingDelegate;

impl MigrationDelegate for PanickingDelegate {
    fn current_version(&self) -> SchemaVersion {
        SchemaVersion::new(1)
    }

    fn migrate(
        &self,
        db: &dyn Database,
        _from: SchemaVersion,
        _to: SchemaVersion,
    ) -> Result<(), crate::delegate::DelegateError> {
        db.execute_batch("CREATE TABLE half_done (id INTEGER)")?;
        panic!("delegate blew up");
    }
}

#[test]
fn panicking_delegate_still_returns_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panic.sqlite");
    let manager = ProvidedMigrationManager::new(
        CountingProvider::new(SqliteFileProvider::new(&path)),
        SqliteMigrationManager,
        SqliteMigrationManager,
        PanickingDelegate,
    );

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| manager.migrate()));

    assert!(outcome.is_err(), "panic should propagate to the caller");
    assert_eq!(manager.provider().counts(), (1, 1));
    let db = SqliteBackend::from_path(&path).unwrap();
    assert!(!db.relation_exists("half_done").unwrap());
    assert_eq!(
        SqliteMigrationManager.current_version(&db).unwrap(),
        SchemaVersion::ZERO
    );
}
