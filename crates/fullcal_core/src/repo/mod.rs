//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Keep SQL inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories refuse connections whose schema is not fully migrated.
//! - Timestamps are stored as UTC epoch milliseconds.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::event::EventValidationError;
use crate::model::occurrence::OccurrenceValidationError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod event_repo;
pub mod occurrence_repo;
pub mod site_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for calendar persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    EventValidation(EventValidationError),
    OccurrenceValidation(OccurrenceValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: i64,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventValidation(err) => write!(f, "{err}"),
            Self::OccurrenceValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted calendar data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "calendar repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "calendar repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EventValidation(err) => Some(err),
            Self::OccurrenceValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. }
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::EventValidation(value)
    }
}

impl From<OccurrenceValidationError> for RepoError {
    fn from(value: OccurrenceValidationError) -> Self {
        Self::OccurrenceValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn to_epoch_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn from_epoch_ms(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp `{value}` out of range in {column}"))
    })
}
