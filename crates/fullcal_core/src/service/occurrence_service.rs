//! Occurrence query engine.
//!
//! # Responsibility
//! - Answer "upcoming from T" and "overlaps day D" across events.
//! - Provide site-scoped variants driven by an explicit `SiteContext`.
//!
//! # Invariants
//! - Read-only; every call is an independent query.
//! - Results are ordered by `(start_time, end_time)`.

use crate::model::event::EventId;
use crate::model::occurrence::{DateWindow, Occurrence};
use crate::model::site::MAIN_SITE_ID;
use crate::repo::occurrence_repo::{OccurrenceQuery, OccurrenceRepository};
use crate::repo::RepoResult;
use crate::service::site_context::SiteContext;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

pub struct OccurrenceService<R: OccurrenceRepository> {
    repo: R,
}

impl<R: OccurrenceRepository> OccurrenceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Occurrences starting at or after `reference` (default: now) and, when
    /// `horizon` is set, no later than it.
    pub fn upcoming(
        &self,
        reference: Option<DateTime<Utc>>,
        horizon: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Occurrence>> {
        self.run(&upcoming_query(reference, horizon, limit))
    }

    /// Occurrences overlapping `day` (default: today), optionally for one
    /// event.
    pub fn daily(
        &self,
        day: Option<NaiveDate>,
        event_id: Option<EventId>,
    ) -> RepoResult<Vec<Occurrence>> {
        self.run(&daily_query(day, event_id))
    }

    pub fn site_upcoming(
        &self,
        site: &SiteContext,
        reference: Option<DateTime<Utc>>,
        horizon: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Occurrence>> {
        self.run(&upcoming_query(reference, horizon, limit).in_sites([site.site_id()]))
    }

    pub fn site_daily(
        &self,
        site: &SiteContext,
        day: Option<NaiveDate>,
        event_id: Option<EventId>,
    ) -> RepoResult<Vec<Occurrence>> {
        self.run(&daily_query(day, event_id).in_sites([site.site_id()]))
    }

    /// Upcoming occurrences of the main site and `site` combined.
    ///
    /// Both halves match on the owning event's site, not the category's.
    pub fn site_and_main_upcoming(
        &self,
        site: &SiteContext,
        reference: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Occurrence>> {
        if site.site().is_main() {
            return self.site_upcoming(site, reference, None, limit);
        }
        self.run(&upcoming_query(reference, None, limit).in_sites([MAIN_SITE_ID, site.site_id()]))
    }

    /// Occurrences overlapping an arbitrary window, used by month/year views
    /// and the JSON feed.
    pub fn in_window(
        &self,
        window: DateWindow,
        site: Option<&SiteContext>,
    ) -> RepoResult<Vec<Occurrence>> {
        let query = OccurrenceQuery::overlapping(window);
        let query = match site {
            Some(site) => query.in_sites([site.site_id()]),
            None => query,
        };
        self.run(&query)
    }

    pub fn run(&self, query: &OccurrenceQuery) -> RepoResult<Vec<Occurrence>> {
        let occurrences = self.repo.list_occurrences(query)?;
        debug!(
            "event=occurrence_query module=service status=ok results={} sites={:?} event_id={:?}",
            occurrences.len(),
            query.site_ids,
            query.event_id
        );
        Ok(occurrences)
    }
}

fn upcoming_query(
    reference: Option<DateTime<Utc>>,
    horizon: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> OccurrenceQuery {
    OccurrenceQuery::upcoming(reference.unwrap_or_else(Utc::now), horizon).with_limit(limit)
}

fn daily_query(day: Option<NaiveDate>, event_id: Option<EventId>) -> OccurrenceQuery {
    let day = day.unwrap_or_else(|| Utc::now().date_naive());
    OccurrenceQuery::overlapping(DateWindow::day(day)).for_event(event_id)
}
