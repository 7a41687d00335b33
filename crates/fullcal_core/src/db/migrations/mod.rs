//! Ordered calendar schema steps.
//!
//! Each step is an embedded SQL script keyed by the `user_version` it leaves
//! the database at. Pending steps run together in one transaction, so a
//! failing step leaves the previous version in place.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// (resulting `user_version`, script)
const SCHEMA_STEPS: &[(u32, &str)] = &[
    (1, include_str!("0001_calendar.sql")),
    (2, include_str!("0002_occurrence_indexes.sql")),
];

/// Schema version this build writes and reads.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `Sqlite` when a step fails; nothing from this call is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let to_version = latest_version();
    if from_version > to_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }

    let pending = pending_steps(from_version);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, script) in pending {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
        debug!("event=db_migrate_step module=db status=ok version={version}");
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={to_version}");
    Ok(())
}

fn pending_steps(from_version: u32) -> Vec<(u32, &'static str)> {
    SCHEMA_STEPS
        .iter()
        .copied()
        .filter(|(version, _)| *version > from_version)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{latest_version, pending_steps, SCHEMA_STEPS};

    #[test]
    fn step_versions_increase_by_one() {
        for (index, (version, _)) in SCHEMA_STEPS.iter().enumerate() {
            assert_eq!(*version as usize, index + 1);
        }
        assert_eq!(latest_version(), SCHEMA_STEPS.len() as u32);
    }

    #[test]
    fn only_newer_steps_are_pending() {
        let versions: Vec<u32> = pending_steps(1).into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![2]);
        assert!(pending_steps(latest_version()).is_empty());
    }
}
