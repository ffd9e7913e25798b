//! Configuration types and parsing for ratchet.yml

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::GlobalArgs;

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "ratchet.yml";

/// Project configuration from ratchet.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directory holding `NNN_name.sql` migration files
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,

    /// Where the schema version is persisted
    #[serde(default)]
    pub version_store: VersionStoreKind,

    /// Table used by the `table` version store
    #[serde(default = "default_version_table")]
    pub version_table: String,
}

/// Database backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// DuckDB
    Duckdb,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Duckdb => write!(f, "duckdb"),
        }
    }
}

/// Version store selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStoreKind {
    /// SQLite's built-in `user_version` counter
    #[default]
    Native,
    /// A single-row version table, usable on every backend
    Table,
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database backend
    #[serde(default)]
    pub backend: Backend,

    /// Database file path or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,

    /// How long SQLite waits for a competing lock before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            migrations_path: default_migrations_path(),
            version_store: VersionStoreKind::default(),
            version_table: default_version_table(),
        }
    }
}

fn default_db_path() -> String {
    "ratchet.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_migrations_path() -> String {
    "migrations".to_string()
}

fn default_version_table() -> String {
    ratchet_migrate::table::DEFAULT_VERSION_TABLE.to_string()
}

impl Config {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config named by `--config`, else `ratchet.yml` in `dir` when it
    /// exists, else defaults. Returns the directory relative paths resolve against.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<(Self, PathBuf)> {
        if let Some(path) = explicit {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf());
            return Ok((Self::load(path)?, root));
        }

        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            Ok((Self::load(&candidate)?, dir.to_path_buf()))
        } else {
            log::debug!("No {} in {}, using defaults", CONFIG_FILE, dir.display());
            Ok((Self::default(), dir.to_path_buf()))
        }
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, global: &GlobalArgs) -> Result<()> {
        if let Some(path) = &global.database {
            self.database.path = path.clone();
        }
        if let Some(backend) = global.backend {
            self.database.backend = backend;
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.version_store == VersionStoreKind::Native && self.database.backend != Backend::Sqlite
        {
            anyhow::bail!(
                "version_store 'native' requires the sqlite backend; use 'table' for {}",
                self.database.backend
            );
        }
        if self.migrations_path.trim().is_empty() {
            anyhow::bail!("migrations_path must not be empty");
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    pub fn migrations_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_path)
    }

    /// Database path resolved against `root`; `:memory:` passes through.
    pub fn database_path(&self, root: &Path) -> String {
        if self.database.path == ":memory:" {
            return self.database.path.clone();
        }
        root.join(&self.database.path).display().to_string()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
