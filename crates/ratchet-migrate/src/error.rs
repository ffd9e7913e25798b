//! Error types for the migration engine.

use crate::delegate::DelegateError;
use crate::version::SchemaVersion;
use ratchet_db::DbError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The step of a migration run an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Obtaining a database handle from a connection provider.
    Connect,
    /// Acquiring the migration lock and starting the transaction.
    AcquireLock,
    /// Reading the persisted schema version.
    ReadVersion,
    /// Comparing the persisted version with the application's version.
    CheckVersion,
    /// Running the migration delegate.
    ApplyMigrations,
    /// Persisting the new schema version.
    WriteVersion,
    /// Committing the transaction and releasing the lock.
    Commit,
    /// Rolling back the transaction and releasing the lock.
    Rollback,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStep::Connect => "connect",
            MigrationStep::AcquireLock => "acquire lock",
            MigrationStep::ReadVersion => "read version",
            MigrationStep::CheckVersion => "check version",
            MigrationStep::ApplyMigrations => "apply migrations",
            MigrationStep::WriteVersion => "write version",
            MigrationStep::Commit => "commit",
            MigrationStep::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Migration engine errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// No usable database handle could be obtained (MG001).
    #[error("[MG001] Database connection unavailable: {0}")]
    Connection(#[source] DbError),

    /// Another migration holds the migration lock (MG002).
    #[error("[MG002] Migration lock is held by another migration: {0}")]
    LockTimeout(#[source] DbError),

    /// The backend failed to begin, commit, or roll back (MG003).
    #[error("[MG003] Migration transaction failed during {step}: {source}")]
    Transaction {
        step: MigrationStep,
        #[source]
        source: DbError,
    },

    /// The persisted schema version could not be read (MG004).
    #[error("[MG004] Failed to read schema version: {0}")]
    VersionRead(#[source] DbError),

    /// The new schema version could not be persisted (MG005).
    #[error("[MG005] Failed to write schema version {version}: {source}")]
    VersionWrite {
        version: SchemaVersion,
        #[source]
        source: DbError,
    },

    /// The migration delegate reported a failure (MG006).
    #[error("[MG006] Migration from version {from} to {to} failed: {source}")]
    Delegate {
        from: SchemaVersion,
        to: SchemaVersion,
        #[source]
        source: DelegateError,
    },

    /// The database was migrated by a newer application build (MG007).
    #[error(
        "[MG007] Database schema version {database} is newer than the application's version {application}"
    )]
    SchemaNewerThanApplication {
        database: SchemaVersion,
        application: SchemaVersion,
    },

    /// An operation was used outside its contract (MG008).
    #[error("[MG008] Migration precondition violated: {0}")]
    Precondition(String),

    /// The backend holds a value that is not a schema version (MG009).
    #[error("[MG009] Stored schema version {0} is not a valid version")]
    InvalidStoredVersion(i64),

    /// A migration set is malformed (MG010).
    #[error("[MG010] Invalid migration set: {0}")]
    InvalidMigrations(String),

    /// Migration files could not be read (MG011).
    #[error("[MG011] Failed to read migrations from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// The migration step that failed, for errors raised during a run.
    pub fn step(&self) -> Option<MigrationStep> {
        match self {
            MigrateError::Connection(_) => Some(MigrationStep::Connect),
            MigrateError::LockTimeout(_) => Some(MigrationStep::AcquireLock),
            MigrateError::Transaction { step, .. } => Some(*step),
            MigrateError::VersionRead(_) | MigrateError::InvalidStoredVersion(_) => {
                Some(MigrationStep::ReadVersion)
            }
            MigrateError::SchemaNewerThanApplication { .. } => Some(MigrationStep::CheckVersion),
            MigrateError::Delegate { .. } => Some(MigrationStep::ApplyMigrations),
            MigrateError::VersionWrite { .. } => Some(MigrationStep::WriteVersion),
            MigrateError::Precondition(_)
            | MigrateError::InvalidMigrations(_)
            | MigrateError::Io { .. } => None,
        }
    }

    /// True when retrying later may succeed.
    ///
    /// Only lock contention qualifies. A newer database schema is never
    /// retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrateError::LockTimeout(_) => true,
            MigrateError::Transaction { source, .. } => source.is_busy(),
            _ => false,
        }
    }
}
