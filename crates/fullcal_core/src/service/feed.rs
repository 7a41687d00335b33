//! JSON calendar feed in FullCalendar event-object shape.

use crate::config::SiteColor;
use crate::model::event::EventId;
use crate::model::occurrence::{Occurrence, OccurrenceId};
use crate::model::site::SiteId;
use crate::service::agenda::LegendEntry;
use chrono::TimeZone;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// One feed item. Colors are flattened in when the site has a color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: OccurrenceId,
    pub event_id: EventId,
    pub title: String,
    pub start: String,
    pub end: String,
    pub url: String,
    #[serde(flatten)]
    pub colors: Option<LegendEntry>,
}

/// Maps occurrences to feed entries with RFC 3339 times in `tz`.
pub fn calendar_feed<Z>(
    occurrences: &[Occurrence],
    site_colors: &BTreeMap<SiteId, SiteColor>,
    tz: &Z,
) -> Vec<FeedEntry>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    occurrences
        .iter()
        .map(|occurrence| FeedEntry {
            id: occurrence.id,
            event_id: occurrence.event_id,
            title: occurrence.title(),
            start: occurrence.start_time.with_timezone(tz).to_rfc3339(),
            end: occurrence.end_time.with_timezone(tz).to_rfc3339(),
            url: occurrence.absolute_url(),
            colors: site_colors
                .get(&occurrence.site_id)
                .and_then(LegendEntry::from_site_color),
        })
        .collect()
}

pub fn calendar_feed_json<Z>(
    occurrences: &[Occurrence],
    site_colors: &BTreeMap<SiteId, SiteColor>,
    tz: &Z,
) -> serde_json::Result<String>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    serde_json::to_string(&calendar_feed(occurrences, site_colors, tz))
}
