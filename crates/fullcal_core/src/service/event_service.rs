//! Event use-case service.
//!
//! # Responsibility
//! - Create events with their expanded occurrences.
//! - Answer event-scoped occurrence questions (upcoming, next, daily).
//!
//! # Invariants
//! - Rules are expanded before any row is written.
//! - A failed occurrence insert leaves no event row behind.

use crate::config::CalendarSettings;
use crate::model::event::{CategoryId, Event, EventId, NewEvent};
use crate::model::occurrence::{DateWindow, Occurrence, OccurrenceId};
use crate::recurrence::{Expander, RecurrenceRule};
use crate::repo::event_repo::EventRepository;
use crate::repo::occurrence_repo::{OccurrenceQuery, OccurrenceRepository};
use crate::service::site_context::SiteContext;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Utc};
use log::{info, warn};

/// How a new event picks its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    Id(CategoryId),
    /// Looked up by name within the site, created when missing.
    Name(String),
}

/// Request model for `EventService::create_event`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateEventRequest {
    pub title: String,
    pub category: Option<CategoryRef>,
    /// Event body text.
    pub description: String,
    /// Defaults to the start of the current hour.
    pub start_time: Option<DateTime<Utc>>,
    /// Defaults to `start_time` plus the configured default duration.
    pub end_time: Option<DateTime<Utc>>,
    pub rule: RecurrenceRule,
}

impl CreateEventRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

pub struct EventService<E: EventRepository, O: OccurrenceRepository> {
    events: E,
    occurrences: O,
    expander: Expander,
    default_duration: TimeDelta,
}

impl<E: EventRepository, O: OccurrenceRepository> EventService<E, O> {
    pub fn new(events: E, occurrences: O) -> Self {
        Self::with_settings(events, occurrences, &CalendarSettings::default())
    }

    pub fn with_settings(events: E, occurrences: O, settings: &CalendarSettings) -> Self {
        Self {
            events,
            occurrences,
            expander: Expander::new(settings.max_occurrences_per_rule),
            default_duration: settings.default_occurrence_duration(),
        }
    }

    /// Creates an event in `site` plus its occurrences.
    ///
    /// # Contract
    /// - Start defaults to the current hour, end to start + default duration.
    /// - `CategoryRef::Name` gets or creates the category in `site`.
    /// - Occurrences follow `Expander::expand` for `request.rule`.
    pub fn create_event(
        &self,
        site: &SiteContext,
        request: &CreateEventRequest,
    ) -> ServiceResult<Event> {
        let start_time = request.start_time.unwrap_or_else(current_hour);
        let end_time = request
            .end_time
            .unwrap_or(start_time + self.default_duration);
        let spans = self.expander.expand(start_time, end_time, &request.rule)?;

        let category_id = match &request.category {
            None => None,
            Some(CategoryRef::Name(name)) => {
                Some(self.events.get_or_create_category(site.site_id(), name)?.id)
            }
            Some(CategoryRef::Id(id)) => {
                let category = self
                    .events
                    .get_category(*id)?
                    .ok_or(ServiceError::CategoryNotFound(*id))?;
                Some(category.id)
            }
        };

        let mut new_event = NewEvent::new(site.site_id(), request.title.clone());
        new_event.category_id = category_id;
        new_event.content = request.description.clone();
        let event = self.events.create_event(&new_event)?;

        if let Err(err) = self.occurrences.insert_occurrences(event.id, &spans) {
            if let Err(cleanup_err) = self.events.delete_event(event.id) {
                warn!(
                    "event=event_create module=service status=error event_id={} error_code=cleanup_failed error={cleanup_err}",
                    event.id
                );
            }
            return Err(err.into());
        }

        info!(
            "event=event_create module=service status=ok event_id={} site_id={} occurrences={}",
            event.id,
            site.site_id(),
            spans.len()
        );
        Ok(event)
    }

    /// Expands `rule` from `start_time..end_time` and attaches the result to
    /// an existing event.
    pub fn add_occurrences(
        &self,
        event_id: EventId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        rule: &RecurrenceRule,
    ) -> ServiceResult<Vec<OccurrenceId>> {
        let spans = self.expander.expand(start_time, end_time, rule)?;
        Ok(self.occurrences.insert_occurrences(event_id, &spans)?)
    }

    pub fn get_event(&self, event_id: EventId) -> ServiceResult<Event> {
        self.events
            .get_event(event_id)?
            .ok_or(ServiceError::EventNotFound(event_id))
    }

    pub fn list_events(&self, site: Option<&SiteContext>) -> ServiceResult<Vec<Event>> {
        Ok(self.events.list_events(site.map(SiteContext::site_id))?)
    }

    /// Deletes the event and, through the cascade, its occurrences.
    pub fn delete_event(&self, event_id: EventId) -> ServiceResult<()> {
        Ok(self.events.delete_event(event_id)?)
    }

    /// Occurrences of the event starting at or after `now` (default: current
    /// time).
    pub fn upcoming_occurrences(
        &self,
        event_id: EventId,
        now: Option<DateTime<Utc>>,
    ) -> ServiceResult<Vec<Occurrence>> {
        let query = OccurrenceQuery::upcoming(now.unwrap_or_else(Utc::now), None)
            .for_event(Some(event_id));
        Ok(self.occurrences.list_occurrences(&query)?)
    }

    /// First upcoming occurrence of the event, if any.
    pub fn next_occurrence(
        &self,
        event_id: EventId,
        now: Option<DateTime<Utc>>,
    ) -> ServiceResult<Option<Occurrence>> {
        let query = OccurrenceQuery::upcoming(now.unwrap_or_else(Utc::now), None)
            .for_event(Some(event_id))
            .with_limit(Some(1));
        Ok(self.occurrences.list_occurrences(&query)?.into_iter().next())
    }

    /// Occurrences of the event overlapping `day` (default: today).
    pub fn daily_occurrences(
        &self,
        event_id: EventId,
        day: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Occurrence>> {
        let day = day.unwrap_or_else(|| Utc::now().date_naive());
        let query = OccurrenceQuery::overlapping(DateWindow::day(day)).for_event(Some(event_id));
        Ok(self.occurrences.list_occurrences(&query)?)
    }
}

fn current_hour() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now)
}
