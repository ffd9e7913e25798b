//! SQLite database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::Database;
use crate::value::{Row, Value};
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// How long a connection waits on another writer's lock before reporting
/// [`DbError::Busy`].
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database backend
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Create a new in-memory SQLite connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::configure(conn)
    }

    /// Create a new SQLite connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Self::configure(conn)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Replace the busy timeout used when another connection holds a lock.
    pub fn with_busy_timeout(self, timeout: Duration) -> DbResult<Self> {
        self.conn
            .lock()?
            .busy_timeout(timeout)
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(self)
    }

    fn configure(conn: Connection) -> DbResult<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| DbError::ConnectionError(format!("failed to set pragmas: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Integer(n) => SqliteValue::Integer(*n),
        Value::Real(r) => SqliteValue::Real(*r),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Blob(b) => SqliteValue::Blob(b.clone()),
    }
}

fn from_sqlite(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(n) => Value::Integer(n),
        SqliteValue::Real(r) => Value::Real(r),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    }
}

fn read_rows(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let col_count = stmt.column_count();
    let rows = stmt
        .query_map(params_from_iter(params.iter().map(to_sqlite)), |row| {
            (0..col_count)
                .map(|i| row.get::<_, SqliteValue>(i).map(from_sqlite))
                .collect::<Result<Row, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database for SqliteBackend {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let conn = self.conn.lock()?;
        conn.execute(sql, params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| DbError::from(e).with_query(sql))
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.conn.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::from(e).with_query(sql))
    }

    fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let conn = self.conn.lock()?;
        read_rows(&conn, sql, params).map_err(|e| DbError::from(e).with_query(sql))
    }

    fn relation_exists(&self, name: &str) -> DbResult<bool> {
        // Attached schemas are not searched, a qualifier is ignored
        let table = name.rsplit('.').next().unwrap_or(name);
        let row = self.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            &[Value::from(table)],
        )?;
        let count = row
            .and_then(|r| r.first().and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(count > 0)
    }

    fn db_type(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;
