//! ratchet-db - Database handle abstraction for Ratchet
//!
//! This crate provides the synchronous `Database` trait consumed by the
//! migration engine, along with DuckDB and SQLite implementations.

pub mod duckdb;
pub mod error;
pub mod sqlite;
pub mod traits;
pub mod value;

pub use crate::duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use sqlite::SqliteBackend;
pub use traits::Database;
pub use value::{Row, Value};
