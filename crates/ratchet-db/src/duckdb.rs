//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::Database;
use crate::value::{Row, Value};
use duckdb::types::Value as DuckValue;
use duckdb::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;

/// DuckDB database backend
///
/// Each backend owns one connection. Handles produced by
/// [`DuckDbBackend::try_clone`] share the database instance but run their
/// own transactions, which is how two migration attempts against the same
/// DuckDB file are expressed inside one process.
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Open a second connection to the same database instance.
    pub fn try_clone(&self) -> DbResult<Self> {
        let conn = self.conn.lock()?;
        let cloned = conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(cloned),
        })
    }
}

fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Integer(n) => DuckValue::BigInt(*n),
        Value::Real(r) => DuckValue::Double(*r),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Blob(b) => DuckValue::Blob(b.clone()),
    }
}

fn from_duck(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Integer(i64::from(b)),
        DuckValue::TinyInt(n) => Value::Integer(i64::from(n)),
        DuckValue::SmallInt(n) => Value::Integer(i64::from(n)),
        DuckValue::Int(n) => Value::Integer(i64::from(n)),
        DuckValue::BigInt(n) => Value::Integer(n),
        DuckValue::UTinyInt(n) => Value::Integer(i64::from(n)),
        DuckValue::USmallInt(n) => Value::Integer(i64::from(n)),
        DuckValue::UInt(n) => Value::Integer(i64::from(n)),
        // COUNT(*) and SUM() come back as 128-bit or unsigned 64-bit integers
        DuckValue::HugeInt(n) => i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(n.to_string())),
        DuckValue::UBigInt(n) => i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(n.to_string())),
        DuckValue::Float(f) => Value::Real(f64::from(f)),
        DuckValue::Double(f) => Value::Real(f),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Blob(b),
        other => Value::Text(format!("{other:?}")),
    }
}

fn read_rows(conn: &Connection, sql: &str, params: &[Value]) -> duckdb::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;

    // column_count() is only reliable once the statement has executed,
    // so read it from each row.
    let rows = stmt
        .query_map(params_from_iter(params.iter().map(to_duck)), |row| {
            let col_count = row.as_ref().column_count();
            (0..col_count)
                .map(|i| row.get::<_, DuckValue>(i).map(from_duck))
                .collect::<Result<Row, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database for DuckDbBackend {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let conn = self.conn.lock()?;
        conn.execute(sql, params_from_iter(params.iter().map(to_duck)))
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
        // Handle schema-qualified names
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => ("main", name),
        };

        let row = self.query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ?",
            &[Value::from(schema), Value::from(table)],
        )?;
        let count = row
            .and_then(|r| r.first().and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(count > 0)
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
