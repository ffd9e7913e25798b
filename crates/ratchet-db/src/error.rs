//! Error types for ratchet-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {message}")]
    ExecutionError {
        message: String,
        /// Backend's own error code (SQLite extended result code)
        vendor_code: Option<i32>,
        /// Statement that failed, when known
        query: Option<String>,
    },

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Database is locked by another connection or transaction (D004)
    #[error("[D004] Database busy: {message}")]
    Busy {
        message: String,
        vendor_code: Option<i32>,
        query: Option<String>,
    },

    /// Mutex poisoned (D005)
    #[error("[D005] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D006)
    #[error("[D006] Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Execution failure with no backend code or statement attached.
    pub fn execution(message: impl Into<String>) -> Self {
        DbError::ExecutionError {
            message: message.into(),
            vendor_code: None,
            query: None,
        }
    }

    /// Lock contention with no backend code or statement attached.
    pub fn busy(message: impl Into<String>) -> Self {
        DbError::Busy {
            message: message.into(),
            vendor_code: None,
            query: None,
        }
    }

    /// True when the failure was caused by another writer holding a lock.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy { .. })
    }

    pub fn vendor_code(&self) -> Option<i32> {
        match self {
            DbError::ExecutionError { vendor_code, .. } | DbError::Busy { vendor_code, .. } => {
                *vendor_code
            }
            _ => None,
        }
    }

    /// The failing statement, if recorded.
    pub fn query(&self) -> Option<&str> {
        match self {
            DbError::ExecutionError { query, .. } | DbError::Busy { query, .. } => {
                query.as_deref()
            }
            _ => None,
        }
    }

    /// Record the statement that failed. Only execution and busy errors
    /// carry a statement.
    pub fn with_query(mut self, sql: &str) -> Self {
        if let DbError::ExecutionError { query, .. } | DbError::Busy { query, .. } = &mut self {
            *query = Some(sql.to_string());
        }
        self
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        let vendor_code = match &err {
            duckdb::Error::DuckDBFailure(failure, _) => Some(failure.extended_code as i32),
            _ => None,
        };
        // duckdb::Error does not expose structured variants for catalog or
        // transaction failures, so classification is by message.
        let message = err.to_string();
        if message.contains("Conflict") || message.contains("write-write conflict") {
            DbError::Busy {
                message,
                vendor_code,
                query: None,
            }
        } else if message.contains("Table with name")
            || message.contains("View with name")
            || message.contains("Table or view with name")
            || (message.contains("Catalog Error")
                && message.contains("Table")
                && message.contains("not found"))
        {
            DbError::TableNotFound(message)
        } else {
            DbError::ExecutionError {
                message,
                vendor_code,
                query: None,
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let vendor_code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code),
            _ => None,
        };
        let message = err.to_string();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => DbError::Busy {
                message,
                vendor_code,
                query: None,
            },
            Some(ErrorCode::CannotOpen) | Some(ErrorCode::NotADatabase) => {
                DbError::ConnectionError(message)
            }
            _ if message.contains("no such table") => DbError::TableNotFound(message),
            _ => DbError::ExecutionError {
                message,
                vendor_code,
                query: None,
            },
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DbError::MutexPoisoned(err.to_string())
    }
}
