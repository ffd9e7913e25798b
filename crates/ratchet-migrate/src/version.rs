//! The schema version newtype.

use crate::error::{MigrateError, MigrateResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer tag identifying which migrations have been applied to a database.
///
/// Non-negative by construction. A database with no stored version is at
/// [`SchemaVersion::ZERO`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Version of a database nothing has been applied to.
    pub const ZERO: SchemaVersion = SchemaVersion(0);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The following version, or `None` on overflow.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// Convert an integer read back from a backend.
    ///
    /// Backends store versions as signed integers; anything negative or
    /// beyond `u32::MAX` means the stored value was not written by Ratchet.
    pub fn from_stored(raw: i64) -> MigrateResult<Self> {
        u32::try_from(raw)
            .map(Self)
            .map_err(|_| MigrateError::InvalidStoredVersion(raw))
    }
}

impl From<u32> for SchemaVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl From<SchemaVersion> for i64 {
    fn from(version: SchemaVersion) -> Self {
        i64::from(version.0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
