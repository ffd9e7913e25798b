//! ratchet-migrate - Schema migration engine for Ratchet
//!
//! Applies caller-supplied schema changes to a database and records the
//! resulting schema version, all inside one exclusively locked transaction.
//! Either the new version and every schema change become visible together,
//! or neither does.
//!
//! The moving parts are small traits: a [`VersionStore`] persists the
//! version, a [`TransactionCoordinator`] provides locking and atomicity, and
//! a [`MigrationDelegate`] knows how to reach the application's version.
//! [`MigrationManager`] composes them.

pub mod delegate;
pub mod error;
pub mod manager;
pub mod provider;
pub mod sql_migrations;
pub mod sqlite;
pub mod store;
pub mod table;
pub mod transaction;
pub mod version;

pub use delegate::{DelegateError, MigrationDelegate};
pub use error::{MigrateError, MigrateResult, MigrationStep};
pub use manager::{MigrationManager, MigrationStatus, StatusKind};
pub use provider::{
    ConnectionProvider, DuckDbProvider, ProvidedMigrationManager, SqliteFileProvider,
};
pub use sql_migrations::{Migration, SqlMigrationError, SqlMigrations};
pub use sqlite::SqliteMigrationManager;
pub use store::VersionStore;
pub use table::TableMigrationManager;
pub use transaction::{MigrationTransaction, TransactionCoordinator};
pub use version::SchemaVersion;
