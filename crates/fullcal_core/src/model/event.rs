//! Event and event-category records.
//!
//! # Invariants
//! - Event titles are non-empty after trimming and at most
//!   `EVENT_TITLE_MAX_CHARS` characters.
//! - Category names are non-empty and unique per site (enforced by storage).
//! - `slug` is derived from the title and never empty.

use crate::model::site::SiteId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EventId = i64;
pub type CategoryId = i64;

pub const EVENT_TITLE_MAX_CHARS: usize = 500;
pub const CATEGORY_NAME_MAX_CHARS: usize = 50;
pub const CATEGORY_DESCRIPTION_MAX_CHARS: usize = 255;

static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug separator regex"));

/// Simple event classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id: CategoryId,
    pub site_id: SiteId,
    pub name: String,
    pub description: String,
}

/// Container record for event metadata. Time spans live in occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub site_id: SiteId,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub slug: String,
    /// Rich-text body.
    pub content: String,
}

/// Insert model for events; ids are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub site_id: SiteId,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub content: String,
}

impl NewEvent {
    pub fn new(site_id: SiteId, title: impl Into<String>) -> Self {
        Self {
            site_id,
            category_id: None,
            title: title.into(),
            content: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), EventValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(EventValidationError::EmptyTitle);
        }
        let chars = title.chars().count();
        if chars > EVENT_TITLE_MAX_CHARS {
            return Err(EventValidationError::TitleTooLong(chars));
        }
        Ok(())
    }

    /// URL-safe slug derived from the title.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Validates a category name/description pair before persistence.
pub fn validate_category(name: &str, description: &str) -> Result<(), EventValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EventValidationError::EmptyCategoryName);
    }
    let name_chars = name.chars().count();
    if name_chars > CATEGORY_NAME_MAX_CHARS {
        return Err(EventValidationError::CategoryNameTooLong(name_chars));
    }
    let description_chars = description.chars().count();
    if description_chars > CATEGORY_DESCRIPTION_MAX_CHARS {
        return Err(EventValidationError::CategoryDescriptionTooLong(
            description_chars,
        ));
    }
    Ok(())
}

/// Lowercases `title` and joins its alphanumeric runs with `-`.
///
/// Falls back to `event` when nothing alphanumeric remains.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let slug = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "event".to_string()
    } else {
        slug.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    EmptyTitle,
    TitleTooLong(usize),
    EmptyCategoryName,
    CategoryNameTooLong(usize),
    CategoryDescriptionTooLong(usize),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "event title cannot be empty"),
            Self::TitleTooLong(chars) => write!(
                f,
                "event title has {chars} characters, max is {EVENT_TITLE_MAX_CHARS}"
            ),
            Self::EmptyCategoryName => write!(f, "event category name cannot be empty"),
            Self::CategoryNameTooLong(chars) => write!(
                f,
                "event category name has {chars} characters, max is {CATEGORY_NAME_MAX_CHARS}"
            ),
            Self::CategoryDescriptionTooLong(chars) => write!(
                f,
                "event category description has {chars} characters, max is {CATEGORY_DESCRIPTION_MAX_CHARS}"
            ),
        }
    }
}

impl Error for EventValidationError {}

#[cfg(test)]
mod tests {
    use super::{slugify, validate_category, EventValidationError, NewEvent};

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("  Summer Fête: Opening Night!  "), "summer-f-te-opening-night");
        assert_eq!(slugify("Weekly Sync"), "weekly-sync");
        assert_eq!(slugify("!!!"), "event");
    }

    #[test]
    fn new_event_rejects_blank_title() {
        let event = NewEvent::new(1, "   ");
        assert_eq!(event.validate(), Err(EventValidationError::EmptyTitle));
    }

    #[test]
    fn category_name_length_is_bounded() {
        let long_name = "x".repeat(51);
        assert_eq!(
            validate_category(&long_name, ""),
            Err(EventValidationError::CategoryNameTooLong(51))
        );
        assert!(validate_category("Concerts", "Live music").is_ok());
    }
}
