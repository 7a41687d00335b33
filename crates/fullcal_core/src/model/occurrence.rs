//! Occurrence records, time spans and calendar windows.
//!
//! # Responsibility
//! - Represent one concrete time span of an event.
//! - Provide the overlap predicate used by day/month/year views.
//!
//! # Invariants
//! - `start_time <= end_time` for every persisted occurrence.
//! - Occurrence order is `(start_time, end_time)`.
//! - Window bounds are inclusive and second-granular: a day window ends at
//!   `23:59:59`.

use crate::model::event::EventId;
use crate::model::site::SiteId;
use crate::route::Route;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OccurrenceId = i64;

pub const OCCURRENCE_DESCRIPTION_MAX_CHARS: usize = 100;

/// Half of an occurrence: the `[start, end]` instants without ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, OccurrenceValidationError> {
        if end < start {
            return Err(OccurrenceValidationError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// One persisted occurrence joined with the owning event's display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub event_id: EventId,
    /// Site of the owning event.
    pub site_id: SiteId,
    /// Title of the owning event.
    pub event_title: String,
    /// Optional free-text override appended to the display title.
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Occurrence {
    pub fn span(&self) -> TimeSpan {
        TimeSpan {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Display title: the event title, suffixed with `(description)` when set.
    pub fn title(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                format!("{} ({description})", self.event_title)
            }
            _ => self.event_title.clone(),
        }
    }

    /// Whether the occurrence has fully ended before `now`.
    pub fn in_past(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }

    /// Occurrences link to their event page.
    pub fn absolute_url(&self) -> String {
        Route::Event { id: self.event_id }.reverse()
    }
}

impl Display for Occurrence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.start_time.to_rfc3339())
    }
}

/// Validates the optional description override.
pub fn validate_description(description: Option<&str>) -> Result<(), OccurrenceValidationError> {
    if let Some(value) = description {
        let chars = value.chars().count();
        if chars > OCCURRENCE_DESCRIPTION_MAX_CHARS {
            return Err(OccurrenceValidationError::DescriptionTooLong(chars));
        }
    }
    Ok(())
}

/// Inclusive calendar window used by day/month/year queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// `[day 00:00:00, day 23:59:59]` in UTC.
    pub fn day(day: NaiveDate) -> Self {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + TimeDelta::seconds(86_399),
        }
    }

    /// Whole calendar month. `None` for an invalid `month`.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self::between(first, next))
    }

    /// Whole calendar year.
    pub fn year(year: i32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self::between(first, next))
    }

    /// `first` through `last`, both days included. `None` when reversed.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        if last < first {
            return None;
        }
        Some(Self::between(first, last.succ_opt()?))
    }

    fn between(first: NaiveDate, next: NaiveDate) -> Self {
        Self {
            start: first.and_time(NaiveTime::MIN).and_utc(),
            end: next.and_time(NaiveTime::MIN).and_utc() - TimeDelta::seconds(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// True when the span starts inside, ends inside, or strictly covers the
    /// window.
    pub fn overlaps(&self, span: &TimeSpan) -> bool {
        self.contains(span.start)
            || self.contains(span.end)
            || (span.start < self.start && span.end > self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceValidationError {
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    DescriptionTooLong(usize),
}

impl Display for OccurrenceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndBeforeStart { start, end } => write!(
                f,
                "occurrence end `{}` is earlier than start `{}`",
                end.to_rfc3339(),
                start.to_rfc3339()
            ),
            Self::DescriptionTooLong(chars) => write!(
                f,
                "occurrence description has {chars} characters, max is {OCCURRENCE_DESCRIPTION_MAX_CHARS}"
            ),
        }
    }
}

impl Error for OccurrenceValidationError {}
