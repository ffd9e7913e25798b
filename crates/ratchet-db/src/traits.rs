//! Database trait definition

use crate::error::DbResult;
use crate::value::{Row, Value};

/// Database handle consumed by the migration engine.
///
/// A handle is a borrowed capability over one open connection. Statements
/// issued through the same handle share that connection's transaction
/// context, so the transaction coordinator, version store, and migration
/// delegate all see each other's uncommitted writes.
///
/// Implementations must be Send + Sync; the migration engine never closes a
/// handle it was given.
pub trait Database: Send + Sync {
    /// Execute a single statement, returns affected rows
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize>;

    /// Execute multiple SQL statements without parameters
    fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and collect every row
    fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Run a query and return its first row, if any
    fn query_row(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Check if a table or view exists
    fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        (**self).execute(sql, params)
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        (**self).execute_batch(sql)
    }

    fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_row(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        (**self).query_row(sql, params)
    }

    fn relation_exists(&self, name: &str) -> DbResult<bool> {
        (**self).relation_exists(name)
    }

    fn db_type(&self) -> &'static str {
        (**self).db_type()
    }
}
