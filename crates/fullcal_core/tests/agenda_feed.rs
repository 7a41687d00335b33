use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use fullcal_core::db::open_db_in_memory;
use fullcal_core::service::agenda::{
    get_site_and_main_agenda, occurrence_duration, show_agenda, show_site_agenda, site_legend,
};
use fullcal_core::service::feed::{calendar_feed, calendar_feed_json};
use fullcal_core::{
    CalendarSettings, CreateEventRequest, DateWindow, EventService, OccurrenceRepository,
    OccurrenceService, SiteContext, SiteRepository, SqliteEventRepository,
    SqliteOccurrenceRepository, SqliteSiteRepository, MAIN_SITE_ID,
};
use rusqlite::Connection;

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn add_event(conn: &Connection, site: &SiteContext, title: &str, start: DateTime<Utc>) -> i64 {
    let service = EventService::new(
        SqliteEventRepository::try_new(conn).unwrap(),
        SqliteOccurrenceRepository::try_new(conn).unwrap(),
    );
    let mut request = CreateEventRequest::new(title);
    request.start_time = Some(start);
    request.end_time = Some(start + TimeDelta::hours(1));
    service.create_event(site, &request).unwrap().id
}

struct Fixture {
    conn: Connection,
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        {
            let sites = SqliteSiteRepository::try_new(&conn).unwrap();
            sites.create_site("youth", "youth.example.org").unwrap();
            sites.create_site("choir", "choir.example.org").unwrap();
        }
        Self { conn }
    }

    fn site(&self, id: i64) -> SiteContext {
        let sites = SqliteSiteRepository::try_new(&self.conn).unwrap();
        SiteContext::resolve(&sites, Some(id)).unwrap()
    }
}

#[test]
fn agendas_scope_by_site() {
    let fixture = Fixture::new();
    let main = fixture.site(MAIN_SITE_ID);
    let youth = fixture.site(2);
    let choir = fixture.site(3);
    add_event(&fixture.conn, &main, "Service", at(2024, 5, 5, 10));
    add_event(&fixture.conn, &youth, "Camp", at(2024, 5, 4, 9));
    add_event(&fixture.conn, &choir, "Concert", at(2024, 5, 6, 20));
    add_event(&fixture.conn, &youth, "Old meeting", at(2024, 4, 1, 9));

    let now = Some(at(2024, 5, 1, 0));
    let service = OccurrenceService::new(SqliteOccurrenceRepository::try_new(&fixture.conn).unwrap());

    let all = show_agenda(&service, now, None).unwrap();
    assert!(all.all_sites);
    let titles: Vec<String> = all.occurrences.iter().map(|item| item.title()).collect();
    assert_eq!(titles, vec!["Camp", "Service", "Concert"]);

    let youth_only = show_site_agenda(&service, &youth, now, None).unwrap();
    assert!(!youth_only.all_sites);
    assert_eq!(youth_only.occurrences.len(), 1);

    let merged = get_site_and_main_agenda(&service, &youth, now, None).unwrap();
    let titles: Vec<String> = merged.iter().map(|item| item.title()).collect();
    assert_eq!(titles, vec!["Camp", "Service"]);

    let from_main = get_site_and_main_agenda(&service, &main, now, None).unwrap();
    assert!(main.site().is_main());
    assert_eq!(from_main.len(), 1);
    assert_eq!(from_main[0].title(), "Service");

    let limited = show_agenda(&service, now, Some(2)).unwrap();
    assert_eq!(limited.occurrences.len(), 2);
}

#[test]
fn description_override_shows_in_title_and_feed() {
    let fixture = Fixture::new();
    let main = fixture.site(MAIN_SITE_ID);
    let event_id = add_event(&fixture.conn, &main, "Open house", at(2024, 5, 5, 10));

    let repo = SqliteOccurrenceRepository::try_new(&fixture.conn).unwrap();
    let service = OccurrenceService::new(SqliteOccurrenceRepository::try_new(&fixture.conn).unwrap());
    let occurrence = service.upcoming(Some(at(2024, 5, 1, 0)), None, None).unwrap()[0].clone();
    repo.set_occurrence_description(occurrence.id, Some("spring"))
        .unwrap();
    let stored = repo.get_occurrence(occurrence.id).unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("spring"));
    assert_eq!(stored.title(), "Open house (spring)");

    let window = DateWindow::month(2024, 5).unwrap();
    let items = service.in_window(window, None).unwrap();
    let mut settings = CalendarSettings::default();
    settings.site_colors.insert(
        MAIN_SITE_ID,
        fullcal_core::SiteColor::List(vec!["#123456".to_string(), "#ffffff".to_string()]),
    );

    let feed = calendar_feed(&items, &settings.site_colors, &Utc);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Open house (spring)");
    assert_eq!(feed[0].event_id, event_id);
    assert_eq!(feed[0].url, format!("/event/{event_id}/"));

    let json: serde_json::Value =
        serde_json::from_str(&calendar_feed_json(&items, &settings.site_colors, &Utc).unwrap())
            .unwrap();
    let entry = &json[0];
    assert_eq!(entry["start"], "2024-05-05T10:00:00+00:00");
    assert_eq!(entry["end"], "2024-05-05T11:00:00+00:00");
    assert_eq!(entry["backgroundColor"], "#123456");
    assert_eq!(entry["textColor"], "#ffffff");
    assert_eq!(entry["borderColor"], "#123456");
    assert_eq!(entry["eventId"], event_id);
}

#[test]
fn feed_without_site_color_has_no_color_fields() {
    let fixture = Fixture::new();
    let youth = fixture.site(2);
    add_event(&fixture.conn, &youth, "Camp", at(2024, 7, 1, 9));

    let service = OccurrenceService::new(SqliteOccurrenceRepository::try_new(&fixture.conn).unwrap());
    let items = service
        .in_window(DateWindow::year(2024).unwrap(), Some(&youth))
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(
        &calendar_feed_json(&items, &CalendarSettings::default().site_colors, &chrono_tz::Europe::Berlin)
            .unwrap(),
    )
    .unwrap();

    assert_eq!(json[0]["start"], "2024-07-01T11:00:00+02:00");
    assert!(json[0].get("backgroundColor").is_none());
}

#[test]
fn legend_uses_stored_site_names() {
    let fixture = Fixture::new();
    let settings = CalendarSettings::from_json_str(
        r##"{"site_colors": {"2": "#ff9900", "3": ["#000000", "#ffffff", "#cccccc"], "8": "red"}}"##,
    )
    .unwrap();
    let sites = SqliteSiteRepository::try_new(&fixture.conn)
        .unwrap()
        .list_sites()
        .unwrap();

    let legend = site_legend(&settings.site_colors, &sites);
    assert_eq!(legend.keys().collect::<Vec<_>>(), vec!["choir", "youth"]);
    assert_eq!(legend["youth"].text_color, "white");
    assert_eq!(legend["choir"].border_color, "#cccccc");
}

#[test]
fn duration_string_for_stored_occurrence() {
    let fixture = Fixture::new();
    let main = fixture.site(MAIN_SITE_ID);
    add_event(&fixture.conn, &main, "Vespers", at(2024, 3, 15, 18));

    let service = OccurrenceService::new(SqliteOccurrenceRepository::try_new(&fixture.conn).unwrap());
    let items = service
        .daily(Some(at(2024, 3, 15, 0).date_naive()), None)
        .unwrap();
    assert_eq!(
        occurrence_duration(&items[0], &Utc),
        "Friday, 15 March 2024 18:00 - 19:00"
    );
}
