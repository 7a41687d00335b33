//! URL routes for calendar views.
//!
//! # Responsibility
//! - Resolve request paths to calendar views.
//! - Reverse views back to canonical paths.
//!
//! # Invariants
//! - Paths are matched without the leading `/`; a leading `/` is accepted.
//! - Month segments accept `1..=12` with an optional leading zero.
//! - `reverse(resolve(p))` yields the canonical form of `p`.

use crate::model::event::EventId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static CALENDAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:calendar/)?$").expect("valid calendar route regex"));
static CALENDAR_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^calendar\.json$").expect("valid calendar json route regex"));
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^calendar/(?P<year>\d{4})/$").expect("valid year route regex"));
static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^calendar/(?P<year>\d{4})/(?P<month>0?[1-9]|1[012])/$")
        .expect("valid month route regex")
});
static AGENDA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^agenda/$").expect("valid agenda route regex"));
static EVENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^event/(?P<id>\d+)/$").expect("valid event route regex"));

/// Read-only calendar views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Calendar,
    CalendarJson,
    Year { year: i32 },
    Month { year: i32, month: u32 },
    Agenda,
    Event { id: EventId },
}

impl Route {
    /// Resolves a request path; query strings are ignored.
    pub fn resolve(path: &str) -> Result<Self, RouteError> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.strip_prefix('/').unwrap_or(path);

        if CALENDAR_RE.is_match(path) {
            return Ok(Self::Calendar);
        }
        if CALENDAR_JSON_RE.is_match(path) {
            return Ok(Self::CalendarJson);
        }
        if let Some(caps) = YEAR_RE.captures(path) {
            return Ok(Self::Year {
                year: parse_segment(path, &caps["year"])?,
            });
        }
        if let Some(caps) = MONTH_RE.captures(path) {
            return Ok(Self::Month {
                year: parse_segment(path, &caps["year"])?,
                month: parse_segment(path, &caps["month"])?,
            });
        }
        if AGENDA_RE.is_match(path) {
            return Ok(Self::Agenda);
        }
        if let Some(caps) = EVENT_RE.captures(path) {
            return Ok(Self::Event {
                id: parse_segment(path, &caps["id"])?,
            });
        }

        Err(RouteError::NoMatch(path.to_string()))
    }

    /// Canonical absolute path for this view.
    pub fn reverse(&self) -> String {
        match self {
            Self::Calendar => "/calendar/".to_string(),
            Self::CalendarJson => "/calendar.json".to_string(),
            Self::Year { year } => format!("/calendar/{year:04}/"),
            Self::Month { year, month } => format!("/calendar/{year:04}/{month}/"),
            Self::Agenda => "/agenda/".to_string(),
            Self::Event { id } => format!("/event/{id}/"),
        }
    }

    /// Stable route name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Calendar => "fullcalendar-calendar",
            Self::CalendarJson => "fullcalendar-calendar-json",
            Self::Year { .. } => "fullcalendar-yearly-view",
            Self::Month { .. } => "fullcalendar-monthly-view",
            Self::Agenda => "fullcalendar-agenda",
            Self::Event { .. } => "fullcalendar-event",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NoMatch(String),
    /// A numeric segment matched the pattern but does not fit its type.
    InvalidSegment { path: String, segment: String },
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch(path) => write!(f, "no calendar route matches `{path}`"),
            Self::InvalidSegment { path, segment } => {
                write!(f, "invalid segment `{segment}` in `{path}`")
            }
        }
    }
}

impl Error for RouteError {}

fn parse_segment<T: std::str::FromStr>(path: &str, segment: &str) -> Result<T, RouteError> {
    segment.parse().map_err(|_| RouteError::InvalidSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}
