use super::*;
use ratchet_db::{DuckDbBackend, SqliteBackend};
use std::time::Duration;

fn set(manager: &TableMigrationManager, db: &dyn Database, version: u32) {
    let tx = MigrationTransaction::begin(manager, db).unwrap();
    manager.set_version(&tx, SchemaVersion::new(version)).unwrap();
    tx.commit().unwrap();
}

// ── Version store ──────────────────────────────────────────────────────

#[test]
fn fresh_database_reads_zero_without_creating_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();

    assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::ZERO);
    assert!(!db.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
}

#[test]
fn round_trip_on_duckdb() {
    let db = DuckDbBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();

    for n in [0, 1, 1_000_000] {
        set(&manager, &db, n);
        assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::new(n));
    }
}

#[test]
fn round_trip_on_sqlite() {
    let db = SqliteBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();

    set(&manager, &db, 17);
    assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::new(17));
    // user_version is untouched by the table strategy
    let row = db.query_row("PRAGMA user_version", &[]).unwrap().unwrap();
    assert_eq!(row[0].as_i64(), Some(0));
}

#[test]
fn rollback_discards_version_write() {
    let db = DuckDbBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();
    set(&manager, &db, 2);

    let mut tx = MigrationTransaction::begin(&manager, &db).unwrap();
    manager.set_version(&tx, SchemaVersion::new(3)).unwrap();
    tx.rollback().unwrap();

    assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::new(2));
}

#[test]
fn set_version_after_commit_is_precondition_error() {
    let db = DuckDbBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();

    let mut tx = MigrationTransaction::begin(&manager, &db).unwrap();
    tx.rollback().unwrap();
    let err = manager.set_version(&tx, SchemaVersion::new(1)).unwrap_err();

    assert!(matches!(err, MigrateError::Precondition(_)), "got {err:?}");
}

#[test]
fn negative_stored_version_is_invalid() {
    let db = DuckDbBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();
    set(&manager, &db, 1);
    db.execute_batch("UPDATE ratchet_schema_version SET version = -2")
        .unwrap();

    let err = manager.current_version(&db).unwrap_err();
    assert!(matches!(err, MigrateError::InvalidStoredVersion(-2)));
}

// ── Table names ────────────────────────────────────────────────────────

#[test]
fn custom_schema_qualified_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE SCHEMA meta").unwrap();
    let manager = TableMigrationManager::with_table("meta.app_version").unwrap();

    set(&manager, &db, 5);
    assert!(db.relation_exists("meta.app_version").unwrap());
    assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::new(5));
}

#[test]
fn rejects_unsafe_table_names() {
    for name in ["", "1abc", "a;DROP TABLE x", "a b", "a..b", "schema."] {
        assert!(
            TableMigrationManager::with_table(name).is_err(),
            "{name} should be rejected"
        );
    }
    assert!(TableMigrationManager::with_table("_private.v2_table").is_ok());
}

// ── Locking ────────────────────────────────────────────────────────────

#[test]
fn duckdb_second_claim_fails_fast() {
    let first = DuckDbBackend::in_memory().unwrap();
    let second = first.try_clone().unwrap();
    let manager = TableMigrationManager::new();

    let held = MigrationTransaction::begin(&manager, &first).unwrap();
    let err = MigrationTransaction::begin(&manager, &second).err().unwrap();
    assert!(matches!(err, MigrateError::LockTimeout(_)), "got {err:?}");

    held.commit().unwrap();
    let retry = MigrationTransaction::begin(&manager, &second).unwrap();
    retry.commit().unwrap();
}

#[test]
fn sqlite_second_claim_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.sqlite");
    let first = SqliteBackend::from_path(&path).unwrap();
    let second = SqliteBackend::from_path(&path)
        .unwrap()
        .with_busy_timeout(Duration::from_millis(50))
        .unwrap();
    let manager = TableMigrationManager::new();

    let held = MigrationTransaction::begin(&manager, &first).unwrap();
    let err = MigrationTransaction::begin(&manager, &second).err().unwrap();
    assert!(matches!(err, MigrateError::LockTimeout(_)), "got {err:?}");
    drop(held);

    let retry = MigrationTransaction::begin(&manager, &second).unwrap();
    retry.commit().unwrap();
}

#[test]
fn duckdb_second_claim_on_existing_table_fails_fast() {
    let first = DuckDbBackend::in_memory().unwrap();
    let second = first.try_clone().unwrap();
    let manager = TableMigrationManager::new();
    set(&manager, &first, 4);

    let held = MigrationTransaction::begin(&manager, &first).unwrap();
    let err = MigrationTransaction::begin(&manager, &second).err().unwrap();
    assert!(matches!(err, MigrateError::LockTimeout(_)), "got {err:?}");
    assert!(err.is_retryable());
    drop(held);

    assert_eq!(manager.current_version(&second).unwrap(), SchemaVersion::new(4));
}

#[test]
fn uncommitted_table_is_invisible_to_other_handles() {
    let first = DuckDbBackend::in_memory().unwrap();
    let second = first.try_clone().unwrap();
    let manager = TableMigrationManager::new();

    let held = MigrationTransaction::begin(&manager, &first).unwrap();
    assert!(first.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
    assert!(!second.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
    assert_eq!(manager.current_version(&second).unwrap(), SchemaVersion::ZERO);
    held.commit().unwrap();

    assert!(second.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
}

// ── Bootstrap ──────────────────────────────────────────────────────────

struct FailingDelegate;

impl crate::delegate::MigrationDelegate for FailingDelegate {
    fn current_version(&self) -> SchemaVersion {
        SchemaVersion::new(1)
    }

    fn migrate(
        &self,
        db: &dyn Database,
        _from: SchemaVersion,
        _to: SchemaVersion,
    ) -> Result<(), crate::delegate::DelegateError> {
        db.execute_batch("CREATE TABLE accounts (id INTEGER)")?;
        Err("step two failed".into())
    }
}

#[test]
fn failed_first_migration_leaves_no_version_table() {
    let duck = DuckDbBackend::in_memory().unwrap();
    let sqlite = SqliteBackend::in_memory().unwrap();
    let manager = crate::manager::MigrationManager::table(TableMigrationManager::new(), FailingDelegate);

    for db in [&duck as &dyn Database, &sqlite] {
        let err = manager.migrate(db).unwrap_err();
        assert!(matches!(err, MigrateError::Delegate { .. }), "got {err:?}");
        assert!(!db.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
        assert!(!db.relation_exists("accounts").unwrap());
    }
}

#[test]
fn rolled_back_begin_leaves_no_version_table() {
    let db = SqliteBackend::in_memory().unwrap();
    let manager = TableMigrationManager::new();

    let mut tx = MigrationTransaction::begin(&manager, &db).unwrap();
    tx.rollback().unwrap();

    assert!(!db.relation_exists(DEFAULT_VERSION_TABLE).unwrap());
    assert_eq!(manager.current_version(&db).unwrap(), SchemaVersion::ZERO);
}

#[test]
fn duplicate_version_row_counts_as_contention() {
    let err = row_insert_conflict(DbError::execution(
        "Constraint Error: Duplicate key \"id: 1\" violates primary key constraint.",
    ));
    assert!(err.is_busy(), "got {err:?}");

    let other = row_insert_conflict(DbError::execution("Binder Error: no such column"));
    assert!(!other.is_busy());
}
