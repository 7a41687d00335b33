//! Calendar settings.
//!
//! # Responsibility
//! - Deserialize calendar settings from JSON with defaults for every field.
//! - Validate settings once so callers can rely on typed accessors.
//!
//! # Invariants
//! - `max_occurrences_per_rule` is within `1..=65534`.
//! - `default_occurrence_duration_minutes` is positive.
//! - `display_timezone` names an IANA zone.
//! - List color specs carry at least background and text colors.

use crate::logging::default_log_level;
use crate::model::site::SiteId;
use crate::recurrence::DEFAULT_MAX_OCCURRENCES;
use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_OCCURRENCE_DURATION_MINUTES: i64 = 60;
const MAX_OCCURRENCES_PER_RULE_LIMIT: usize = 65_534;

/// Color assignment for one site.
///
/// Either a single color, or `[background, text]`, or
/// `[background, text, border, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteColor {
    Single(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub default_occurrence_duration_minutes: i64,
    pub max_occurrences_per_rule: usize,
    pub display_timezone: String,
    pub site_colors: BTreeMap<SiteId, SiteColor>,
    pub log: LogSettings,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            default_occurrence_duration_minutes: DEFAULT_OCCURRENCE_DURATION_MINUTES,
            max_occurrences_per_rule: DEFAULT_MAX_OCCURRENCES,
            display_timezone: "UTC".to_string(),
            site_colors: BTreeMap::new(),
            log: LogSettings::default(),
        }
    }
}

impl CalendarSettings {
    /// Parses and validates settings from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_occurrence_duration_minutes <= 0 {
            return Err(ConfigError::InvalidDuration(
                self.default_occurrence_duration_minutes,
            ));
        }
        if !(1..=MAX_OCCURRENCES_PER_RULE_LIMIT).contains(&self.max_occurrences_per_rule) {
            return Err(ConfigError::InvalidMaxOccurrences(
                self.max_occurrences_per_rule,
            ));
        }
        self.display_timezone()?;
        for (site_id, color) in &self.site_colors {
            match color {
                SiteColor::Single(value) if value.trim().is_empty() => {
                    return Err(ConfigError::InvalidSiteColor {
                        site_id: *site_id,
                        reason: "color cannot be empty",
                    });
                }
                SiteColor::List(values) if values.len() < 2 => {
                    return Err(ConfigError::InvalidSiteColor {
                        site_id: *site_id,
                        reason: "color list needs background and text colors",
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn display_timezone(&self) -> Result<Tz, ConfigError> {
        self.display_timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| ConfigError::InvalidTimezone {
                name: self.display_timezone.clone(),
                message: err.to_string(),
            })
    }

    pub fn default_occurrence_duration(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.default_occurrence_duration_minutes)
            .unwrap_or_else(|| TimeDelta::minutes(DEFAULT_OCCURRENCE_DURATION_MINUTES))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidDuration(i64),
    InvalidMaxOccurrences(usize),
    InvalidTimezone {
        name: String,
        message: String,
    },
    InvalidSiteColor {
        site_id: SiteId,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid settings JSON: {err}"),
            Self::InvalidDuration(minutes) => write!(
                f,
                "default_occurrence_duration_minutes must be positive, got {minutes}"
            ),
            Self::InvalidMaxOccurrences(value) => write!(
                f,
                "max_occurrences_per_rule must be within 1..={MAX_OCCURRENCES_PER_RULE_LIMIT}, got {value}"
            ),
            Self::InvalidTimezone { name, message } => {
                write!(f, "unknown display_timezone `{name}`: {message}")
            }
            Self::InvalidSiteColor { site_id, reason } => {
                write!(f, "invalid color for site {site_id}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
