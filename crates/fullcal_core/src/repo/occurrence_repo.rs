//! Occurrence repository and query specification.
//!
//! # Responsibility
//! - Persist expanded occurrence spans for one event atomically.
//! - Evaluate `OccurrenceQuery` specifications against SQLite.
//!
//! # Invariants
//! - `insert_occurrences` writes all spans or none.
//! - Query results are ordered by `(start_time, end_time, id)`.
//! - `OccurrenceQuery::matches` and the SQL translation agree.

use crate::model::event::EventId;
use crate::model::occurrence::{
    validate_description, DateWindow, Occurrence, OccurrenceId, OccurrenceValidationError,
    TimeSpan,
};
use crate::model::site::SiteId;
use crate::repo::{ensure_connection_ready, from_epoch_ms, to_epoch_ms, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::time::Instant;

const OCCURRENCE_SELECT_SQL: &str = "SELECT
    o.id AS id,
    o.event_id AS event_id,
    o.description AS description,
    o.start_time AS start_time,
    o.end_time AS end_time,
    e.site_id AS site_id,
    e.title AS event_title
FROM occurrences o
INNER JOIN events e ON e.id = o.event_id";

/// Eager query specification: predicate, fixed ordering and optional limit.
///
/// All set filters are combined with AND. An empty `site_ids` means every
/// site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceQuery {
    /// Inclusive lower bound on `start_time`.
    pub starts_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `start_time`.
    pub starts_until: Option<DateTime<Utc>>,
    /// Keeps occurrences overlapping the window.
    pub overlapping: Option<DateWindow>,
    pub event_id: Option<EventId>,
    pub site_ids: Vec<SiteId>,
    pub limit: Option<u32>,
}

impl OccurrenceQuery {
    /// Occurrences starting at or after `reference`, and no later than
    /// `horizon` when given.
    pub fn upcoming(reference: DateTime<Utc>, horizon: Option<DateTime<Utc>>) -> Self {
        Self {
            starts_from: Some(reference),
            starts_until: horizon,
            ..Self::default()
        }
    }

    pub fn overlapping(window: DateWindow) -> Self {
        Self {
            overlapping: Some(window),
            ..Self::default()
        }
    }

    pub fn for_event(mut self, event_id: Option<EventId>) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn in_sites(mut self, site_ids: impl IntoIterator<Item = SiteId>) -> Self {
        self.site_ids = site_ids.into_iter().collect();
        self.site_ids.sort_unstable();
        self.site_ids.dedup();
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// In-memory form of the predicate (ordering and limit excluded).
    pub fn matches(&self, occurrence: &Occurrence) -> bool {
        if self
            .starts_from
            .is_some_and(|from| occurrence.start_time < from)
        {
            return false;
        }
        if self
            .starts_until
            .is_some_and(|until| occurrence.start_time > until)
        {
            return false;
        }
        if self
            .overlapping
            .is_some_and(|window| !window.overlaps(&occurrence.span()))
        {
            return false;
        }
        if self.event_id.is_some_and(|id| occurrence.event_id != id) {
            return false;
        }
        self.site_ids.is_empty() || self.site_ids.contains(&occurrence.site_id)
    }
}

pub trait OccurrenceRepository {
    /// Inserts all spans for `event_id` in one transaction, returning the new
    /// ids in span order.
    fn insert_occurrences(
        &self,
        event_id: EventId,
        spans: &[TimeSpan],
    ) -> RepoResult<Vec<OccurrenceId>>;
    fn get_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<Occurrence>>;
    fn list_occurrences(&self, query: &OccurrenceQuery) -> RepoResult<Vec<Occurrence>>;
    /// Sets or clears the description override.
    fn set_occurrence_description(
        &self,
        id: OccurrenceId,
        description: Option<&str>,
    ) -> RepoResult<()>;
}

pub struct SqliteOccurrenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOccurrenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["events", "occurrences"])?;
        Ok(Self { conn })
    }
}

impl OccurrenceRepository for SqliteOccurrenceRepository<'_> {
    fn insert_occurrences(
        &self,
        event_id: EventId,
        spans: &[TimeSpan],
    ) -> RepoResult<Vec<OccurrenceId>> {
        for span in spans {
            if span.end < span.start {
                return Err(OccurrenceValidationError::EndBeforeStart {
                    start: span.start,
                    end: span.end,
                }
                .into());
            }
        }

        let started_at = Instant::now();
        let result = insert_all(self.conn, event_id, spans);
        match &result {
            Ok(ids) => info!(
                "event=occurrence_insert module=repo status=ok event_id={event_id} count={} duration_ms={}",
                ids.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=occurrence_insert module=repo status=error event_id={event_id} count={} duration_ms={} error={err}",
                spans.len(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn get_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<Occurrence>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OCCURRENCE_SELECT_SQL} WHERE o.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_occurrence_row(row)?));
        }
        Ok(None)
    }

    fn list_occurrences(&self, query: &OccurrenceQuery) -> RepoResult<Vec<Occurrence>> {
        let mut sql = format!("{OCCURRENCE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(from) = query.starts_from {
            sql.push_str(" AND o.start_time >= ?");
            bind_values.push(Value::Integer(to_epoch_ms(from)));
        }
        if let Some(until) = query.starts_until {
            sql.push_str(" AND o.start_time <= ?");
            bind_values.push(Value::Integer(to_epoch_ms(until)));
        }
        if let Some(window) = query.overlapping {
            let start = Value::Integer(to_epoch_ms(window.start));
            let end = Value::Integer(to_epoch_ms(window.end));
            sql.push_str(
                " AND (
                    (o.start_time >= ? AND o.start_time <= ?)
                    OR (o.end_time >= ? AND o.end_time <= ?)
                    OR (o.start_time < ? AND o.end_time > ?)
                )",
            );
            for _ in 0..3 {
                bind_values.push(start.clone());
                bind_values.push(end.clone());
            }
        }
        if let Some(event_id) = query.event_id {
            sql.push_str(" AND o.event_id = ?");
            bind_values.push(Value::Integer(event_id));
        }
        if !query.site_ids.is_empty() {
            let placeholders = vec!["?"; query.site_ids.len()].join(", ");
            sql.push_str(&format!(" AND e.site_id IN ({placeholders})"));
            bind_values.extend(query.site_ids.iter().copied().map(Value::Integer));
        }

        sql.push_str(" ORDER BY o.start_time ASC, o.end_time ASC, o.id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut occurrences = Vec::new();
        while let Some(row) = rows.next()? {
            occurrences.push(parse_occurrence_row(row)?);
        }
        Ok(occurrences)
    }

    fn set_occurrence_description(
        &self,
        id: OccurrenceId,
        description: Option<&str>,
    ) -> RepoResult<()> {
        let description = description.map(str::trim).filter(|value| !value.is_empty());
        validate_description(description)?;
        let changed = self.conn.execute(
            "UPDATE occurrences SET description = ?2 WHERE id = ?1;",
            params![id, description],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "occurrence",
                id,
            });
        }
        Ok(())
    }
}

fn insert_all(
    conn: &Connection,
    event_id: EventId,
    spans: &[TimeSpan],
) -> RepoResult<Vec<OccurrenceId>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1);",
        [event_id],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::NotFound {
            entity: "event",
            id: event_id,
        });
    }

    let mut ids = Vec::with_capacity(spans.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO occurrences (event_id, description, start_time, end_time)
             VALUES (?1, NULL, ?2, ?3);",
        )?;
        for span in spans {
            stmt.execute(params![
                event_id,
                to_epoch_ms(span.start),
                to_epoch_ms(span.end)
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }
    tx.commit()?;
    Ok(ids)
}

fn parse_occurrence_row(row: &Row<'_>) -> RepoResult<Occurrence> {
    let start_time = from_epoch_ms(row.get("start_time")?, "occurrences.start_time")?;
    let end_time = from_epoch_ms(row.get("end_time")?, "occurrences.end_time")?;
    if end_time < start_time {
        return Err(RepoError::InvalidData(format!(
            "occurrence {} ends before it starts",
            row.get::<_, i64>("id")?
        )));
    }

    Ok(Occurrence {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        site_id: row.get("site_id")?,
        event_title: row.get("event_title")?,
        description: row.get("description")?,
        start_time,
        end_time,
    })
}
