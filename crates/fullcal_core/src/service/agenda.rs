//! Agenda helpers for rendering layers.
//!
//! # Responsibility
//! - Produce agenda occurrence lists for all sites, one site, or one site
//!   plus the main site.
//! - Format occurrence date ranges and assemble the site color legend.

use crate::config::SiteColor;
use crate::model::occurrence::Occurrence;
use crate::model::site::{Site, SiteId};
use crate::repo::occurrence_repo::OccurrenceRepository;
use crate::repo::RepoResult;
use crate::service::occurrence_service::OccurrenceService;
use crate::service::site_context::SiteContext;
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

const LONG_DATE_TIME_FORMAT: &str = "%A, %d %B %Y %H:%M";
const TIME_FORMAT: &str = "%H:%M";
const DEFAULT_TEXT_COLOR: &str = "white";

/// Data handed to an agenda template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaView {
    pub occurrences: Vec<Occurrence>,
    /// True when the agenda is not restricted to one site.
    pub all_sites: bool,
}

/// Upcoming occurrences across all sites.
pub fn get_agenda<R: OccurrenceRepository>(
    service: &OccurrenceService<R>,
    now: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> RepoResult<Vec<Occurrence>> {
    service.upcoming(now, None, limit)
}

pub fn show_agenda<R: OccurrenceRepository>(
    service: &OccurrenceService<R>,
    now: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> RepoResult<AgendaView> {
    Ok(AgendaView {
        occurrences: get_agenda(service, now, limit)?,
        all_sites: true,
    })
}

/// Upcoming occurrences of the current site.
pub fn get_site_agenda<R: OccurrenceRepository>(
    service: &OccurrenceService<R>,
    site: &SiteContext,
    now: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> RepoResult<Vec<Occurrence>> {
    service.site_upcoming(site, now, None, limit)
}

pub fn show_site_agenda<R: OccurrenceRepository>(
    service: &OccurrenceService<R>,
    site: &SiteContext,
    now: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> RepoResult<AgendaView> {
    Ok(AgendaView {
        occurrences: get_site_agenda(service, site, now, limit)?,
        all_sites: false,
    })
}

/// Upcoming occurrences of the main site and the current site, merged.
pub fn get_site_and_main_agenda<R: OccurrenceRepository>(
    service: &OccurrenceService<R>,
    site: &SiteContext,
    now: Option<DateTime<Utc>>,
    limit: Option<u32>,
) -> RepoResult<Vec<Occurrence>> {
    service.site_and_main_upcoming(site, now, limit)
}

/// Formats the occurrence range in `tz`.
///
/// Same day: `Friday, 15 March 2024 08:00 - 09:00`.
/// Otherwise both ends carry the full date.
pub fn occurrence_duration<Z>(occurrence: &Occurrence, tz: &Z) -> String
where
    Z: TimeZone,
    Z::Offset: Display,
{
    let start = occurrence.start_time.with_timezone(tz);
    let end = occurrence.end_time.with_timezone(tz);
    let end_format = if start.date_naive() == end.date_naive() {
        TIME_FORMAT
    } else {
        LONG_DATE_TIME_FORMAT
    };
    format!(
        "{} - {}",
        start.format(LONG_DATE_TIME_FORMAT),
        end.format(end_format)
    )
}

/// Colors for one legend row, in FullCalendar event-object naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub background_color: String,
    pub text_color: String,
    pub border_color: String,
}

impl LegendEntry {
    /// `None` for lists without a text color.
    pub fn from_site_color(color: &SiteColor) -> Option<Self> {
        match color {
            SiteColor::Single(color) => Some(Self {
                background_color: color.clone(),
                text_color: DEFAULT_TEXT_COLOR.to_string(),
                border_color: color.clone(),
            }),
            SiteColor::List(colors) => match colors.as_slice() {
                [background, text] => Some(Self {
                    background_color: background.clone(),
                    text_color: text.clone(),
                    border_color: background.clone(),
                }),
                [background, text, border, ..] => Some(Self {
                    background_color: background.clone(),
                    text_color: text.clone(),
                    border_color: border.clone(),
                }),
                _ => None,
            },
        }
    }
}

/// Site name -> legend colors for every configured site that exists.
pub fn site_legend(
    colors: &BTreeMap<SiteId, SiteColor>,
    sites: &[Site],
) -> BTreeMap<String, LegendEntry> {
    let names: BTreeMap<SiteId, &str> = sites
        .iter()
        .map(|site| (site.id, site.name.as_str()))
        .collect();

    let mut legend = BTreeMap::new();
    for (site_id, color) in colors {
        let Some(name) = names.get(site_id) else {
            warn!("event=site_legend module=service status=skip site_id={site_id} reason=unknown_site");
            continue;
        };
        if let Some(entry) = LegendEntry::from_site_color(color) {
            legend.insert((*name).to_string(), entry);
        }
    }
    legend
}

#[cfg(test)]
mod tests {
    use super::{occurrence_duration, site_legend, LegendEntry};
    use crate::config::SiteColor;
    use crate::model::occurrence::Occurrence;
    use crate::model::site::Site;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn occurrence(start: DateTime<Utc>, end: DateTime<Utc>) -> Occurrence {
        Occurrence {
            id: 1,
            event_id: 1,
            site_id: 1,
            event_title: "Choir rehearsal".to_string(),
            description: None,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn same_day_duration_shows_end_time_only() {
        let item = occurrence(
            Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
        );
        assert_eq!(
            occurrence_duration(&item, &Utc),
            "Friday, 15 March 2024 08:00 - 09:30"
        );
    }

    #[test]
    fn cross_day_duration_shows_both_dates() {
        let item = occurrence(
            Utc.with_ymd_and_hms(2024, 3, 15, 22, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 16, 2, 0, 0).unwrap(),
        );
        assert_eq!(
            occurrence_duration(&item, &Utc),
            "Friday, 15 March 2024 22:00 - Saturday, 16 March 2024 02:00"
        );
    }

    #[test]
    fn duration_uses_display_timezone_for_day_boundaries() {
        // 22:00-23:30 UTC is 23:00-00:30 in Amsterdam (CET).
        let item = occurrence(
            Utc.with_ymd_and_hms(2024, 3, 15, 22, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 23, 30, 0).unwrap(),
        );
        assert_eq!(
            occurrence_duration(&item, &chrono_tz::Europe::Amsterdam),
            "Friday, 15 March 2024 23:00 - Saturday, 16 March 2024 00:30"
        );
    }

    #[test]
    fn legend_expands_color_specs_and_skips_unknown_sites() {
        let sites = vec![
            Site {
                id: 1,
                name: "main".to_string(),
                domain: String::new(),
            },
            Site {
                id: 2,
                name: "youth".to_string(),
                domain: String::new(),
            },
            Site {
                id: 3,
                name: "choir".to_string(),
                domain: String::new(),
            },
        ];
        let mut colors = BTreeMap::new();
        colors.insert(1, SiteColor::Single("#336699".to_string()));
        colors.insert(2, SiteColor::List(vec!["#ffcc00".to_string(), "black".to_string()]));
        colors.insert(
            3,
            SiteColor::List(vec![
                "#000000".to_string(),
                "#ffffff".to_string(),
                "#ff0000".to_string(),
            ]),
        );
        colors.insert(9, SiteColor::Single("red".to_string()));

        let legend = site_legend(&colors, &sites);
        assert_eq!(legend.len(), 3);
        assert_eq!(
            legend["main"],
            LegendEntry {
                background_color: "#336699".to_string(),
                text_color: "white".to_string(),
                border_color: "#336699".to_string(),
            }
        );
        assert_eq!(legend["youth"].border_color, "#ffcc00");
        assert_eq!(legend["youth"].text_color, "black");
        assert_eq!(legend["choir"].border_color, "#ff0000");
    }

    #[test]
    fn legend_entry_serializes_in_camel_case() {
        let entry = LegendEntry::from_site_color(&SiteColor::Single("red".to_string())).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["backgroundColor"], "red");
        assert_eq!(json["textColor"], "white");
        assert_eq!(json["borderColor"], "red");
        assert!(LegendEntry::from_site_color(&SiteColor::List(vec!["red".to_string()])).is_none());
    }
}
