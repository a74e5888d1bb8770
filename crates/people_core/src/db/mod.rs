//! SQLite storage bootstrap, schema migrations and statement interruption.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the people store.
//! - Apply schema migrations in deterministic order.
//! - Bound statement execution by a caller `Deadline`.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Every returned connection has the `casefold` scalar function registered.

use crate::deadline::Interrupted;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod interrupt;
pub mod migrations;
mod open;

pub use interrupt::with_deadline;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Statement aborted because the caller deadline was cancelled or expired.
    Interrupted(Interrupted),
}

impl DbError {
    /// Returns the interruption reason when the failure came from a deadline.
    pub fn interrupted(&self) -> Option<Interrupted> {
        match self {
            Self::Interrupted(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Interrupted(reason) => write!(f, "database operation interrupted: {reason}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::Interrupted(reason) => Some(reason),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<Interrupted> for DbError {
    fn from(value: Interrupted) -> Self {
        Self::Interrupted(value)
    }
}
