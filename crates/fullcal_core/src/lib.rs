//! Core domain logic for the fullcal calendar.
//! This crate is the single source of truth for recurrence expansion,
//! occurrence storage, and occurrence queries.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod recurrence;
pub mod repo;
pub mod route;
pub mod service;

pub use config::{CalendarSettings, ConfigError, LogSettings, SiteColor};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_settings, logging_status};
pub use model::event::{CategoryId, Event, EventCategory, EventId, EventValidationError, NewEvent};
pub use model::occurrence::{
    DateWindow, Occurrence, OccurrenceId, OccurrenceValidationError, TimeSpan,
};
pub use model::site::{Site, SiteId, MAIN_SITE_ID};
pub use recurrence::{expand, Expander, Frequency, InvalidRuleError, RecurrenceRule};
pub use repo::event_repo::{EventRepository, SqliteEventRepository};
pub use repo::occurrence_repo::{OccurrenceQuery, OccurrenceRepository, SqliteOccurrenceRepository};
pub use repo::site_repo::{SiteRepository, SqliteSiteRepository};
pub use repo::{RepoError, RepoResult};
pub use route::{Route, RouteError};
pub use service::event_service::{CategoryRef, CreateEventRequest, EventService};
pub use service::occurrence_service::OccurrenceService;
pub use service::{ServiceError, ServiceResult, SiteContext, TenantResolutionError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
