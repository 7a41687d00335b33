use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};
use fullcal_core::db::open_db_in_memory;
use fullcal_core::{
    CalendarSettings, CategoryRef, CreateEventRequest, EventRepository, EventService, Frequency,
    InvalidRuleError, Occurrence, OccurrenceId, OccurrenceQuery, OccurrenceRepository,
    RecurrenceRule, RepoError, RepoResult, ServiceError, SiteContext, SiteRepository,
    SqliteEventRepository, SqliteOccurrenceRepository, SqliteSiteRepository, TimeSpan,
    MAIN_SITE_ID,
};
use rusqlite::Connection;

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn main_site(conn: &Connection) -> SiteContext {
    let sites = SqliteSiteRepository::try_new(conn).unwrap();
    SiteContext::resolve(&sites, Some(MAIN_SITE_ID)).unwrap()
}

fn service(conn: &Connection) -> EventService<SqliteEventRepository<'_>, SqliteOccurrenceRepository<'_>> {
    EventService::new(
        SqliteEventRepository::try_new(conn).unwrap(),
        SqliteOccurrenceRepository::try_new(conn).unwrap(),
    )
}

fn occurrence_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM occurrences;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_event_expands_rule_into_occurrences() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Choir rehearsal");
    request.description = "Bring your sheet music.".to_string();
    request.start_time = Some(at(2024, 9, 2, 19));
    request.end_time = Some(at(2024, 9, 2, 21));
    request.rule = RecurrenceRule::new(Frequency::Weekly).count(4);

    let event = service.create_event(&site, &request).unwrap();
    assert_eq!(event.site_id, MAIN_SITE_ID);
    assert_eq!(event.slug, "choir-rehearsal");
    assert_eq!(event.content, "Bring your sheet music.");

    let upcoming = service
        .upcoming_occurrences(event.id, Some(at(2024, 9, 1, 0)))
        .unwrap();
    assert_eq!(upcoming.len(), 4);
    assert_eq!(upcoming[3].start_time, at(2024, 9, 23, 19));
    assert!(upcoming
        .iter()
        .all(|item| item.end_time - item.start_time == TimeDelta::hours(2)));
}

#[test]
fn create_event_defaults_to_current_hour_and_configured_duration() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let settings = CalendarSettings::from_json_str(r#"{"default_occurrence_duration_minutes": 30}"#)
        .unwrap();
    let service = EventService::with_settings(
        SqliteEventRepository::try_new(&conn).unwrap(),
        SqliteOccurrenceRepository::try_new(&conn).unwrap(),
        &settings,
    );

    let before = Utc::now();
    let event = service
        .create_event(&site, &CreateEventRequest::new("Drop-in"))
        .unwrap();
    let after = Utc::now();

    let occurrences = SqliteOccurrenceRepository::try_new(&conn)
        .unwrap()
        .list_occurrences(&OccurrenceQuery::default().for_event(Some(event.id)))
        .unwrap();
    assert_eq!(occurrences.len(), 1);
    let only = &occurrences[0];
    assert_eq!(only.start_time.minute(), 0);
    assert_eq!(only.start_time.second(), 0);
    assert!(only.start_time <= after);
    assert!(before - only.start_time < TimeDelta::hours(1));
    assert_eq!(only.end_time - only.start_time, TimeDelta::minutes(30));
}

#[test]
fn category_by_name_is_reused_within_site() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Bake sale");
    request.category = Some(CategoryRef::Name("Fundraising".to_string()));
    request.start_time = Some(at(2024, 4, 6, 10));
    let first = service.create_event(&site, &request).unwrap();

    request.title = "Car wash".to_string();
    let second = service.create_event(&site, &request).unwrap();

    assert!(first.category_id.is_some());
    assert_eq!(first.category_id, second.category_id);
    let categories = SqliteEventRepository::try_new(&conn)
        .unwrap()
        .list_categories(MAIN_SITE_ID)
        .unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Fundraising");
}

#[test]
fn unknown_category_id_is_rejected_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Orphan");
    request.category = Some(CategoryRef::Id(77));
    let err = service.create_event(&site, &request).unwrap_err();

    assert!(matches!(err, ServiceError::CategoryNotFound(77)));
    assert!(service.list_events(None).unwrap().is_empty());
}

#[test]
fn invalid_rule_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Broken");
    request.start_time = Some(at(2024, 1, 1, 9));
    request.rule = RecurrenceRule {
        count: Some(3),
        until: Some(at(2024, 2, 1, 0)),
        ..RecurrenceRule::default()
    };
    let err = service.create_event(&site, &request).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::InvalidRule(InvalidRuleError::CountAndUntil)
    ));
    assert!(service.list_events(None).unwrap().is_empty());
    assert_eq!(occurrence_count(&conn), 0);
}

#[test]
fn deleting_event_removes_its_occurrences() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Series");
    request.start_time = Some(at(2024, 1, 1, 9));
    request.rule = RecurrenceRule::new(Frequency::Daily).count(3);
    let event = service.create_event(&site, &request).unwrap();
    assert_eq!(occurrence_count(&conn), 3);

    service.delete_event(event.id).unwrap();
    assert_eq!(occurrence_count(&conn), 0);
    assert!(matches!(
        service.get_event(event.id),
        Err(ServiceError::EventNotFound(id)) if id == event.id
    ));
    assert!(matches!(
        service.delete_event(event.id),
        Err(ServiceError::EventNotFound(_))
    ));
}

#[test]
fn bulk_insert_failure_leaves_no_partial_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_third_occurrence
         BEFORE INSERT ON occurrences
         WHEN (SELECT COUNT(*) FROM occurrences) >= 2
         BEGIN
             SELECT RAISE(ABORT, 'storage full');
         END;",
    )
    .unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Too long");
    request.start_time = Some(at(2024, 1, 1, 9));
    request.rule = RecurrenceRule::new(Frequency::Daily).count(5);
    let err = service.create_event(&site, &request).unwrap_err();

    assert!(matches!(err, ServiceError::Repo(RepoError::Db(_))));
    assert_eq!(occurrence_count(&conn), 0);
    assert!(service.list_events(None).unwrap().is_empty());
}

struct FailingOccurrences;

impl OccurrenceRepository for FailingOccurrences {
    fn insert_occurrences(&self, _: i64, _: &[TimeSpan]) -> RepoResult<Vec<OccurrenceId>> {
        Err(RepoError::InvalidData("insert refused".to_string()))
    }

    fn get_occurrence(&self, _: OccurrenceId) -> RepoResult<Option<Occurrence>> {
        Ok(None)
    }

    fn list_occurrences(&self, _: &OccurrenceQuery) -> RepoResult<Vec<Occurrence>> {
        Ok(Vec::new())
    }

    fn set_occurrence_description(&self, _: OccurrenceId, _: Option<&str>) -> RepoResult<()> {
        Ok(())
    }
}

#[test]
fn failed_occurrence_insert_removes_created_event() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = EventService::new(SqliteEventRepository::try_new(&conn).unwrap(), FailingOccurrences);

    let err = service
        .create_event(&site, &CreateEventRequest::new("Ghost"))
        .unwrap_err();

    assert!(matches!(err, ServiceError::Repo(RepoError::InvalidData(_))));
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    assert!(events.list_events(None).unwrap().is_empty());
}

#[test]
fn next_and_daily_occurrences_follow_the_event() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Market");
    request.start_time = Some(at(2024, 3, 2, 8));
    request.end_time = Some(at(2024, 3, 2, 13));
    request.rule = "FREQ=WEEKLY;COUNT=3".parse().unwrap();
    let event = service.create_event(&site, &request).unwrap();

    let next = service
        .next_occurrence(event.id, Some(at(2024, 3, 5, 0)))
        .unwrap()
        .unwrap();
    assert_eq!(next.start_time, at(2024, 3, 9, 8));
    assert!(service
        .next_occurrence(event.id, Some(at(2024, 4, 1, 0)))
        .unwrap()
        .is_none());

    let day = at(2024, 3, 16, 0).date_naive();
    let daily = service.daily_occurrences(event.id, Some(day)).unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].title(), "Market");
}

#[test]
fn add_occurrences_extends_existing_event() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Lecture");
    request.start_time = Some(at(2024, 10, 1, 14));
    let event = service.create_event(&site, &request).unwrap();

    let ids = service
        .add_occurrences(
            event.id,
            at(2024, 11, 1, 14),
            at(2024, 11, 1, 15),
            &RecurrenceRule::new(Frequency::Monthly).count(2),
        )
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(occurrence_count(&conn), 3);

    let err = service
        .add_occurrences(
            9_999,
            at(2024, 11, 1, 14),
            at(2024, 11, 1, 15),
            &RecurrenceRule::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::EventNotFound(9_999)));
}

#[test]
fn events_are_listed_per_site() {
    let conn = open_db_in_memory().unwrap();
    let sites = SqliteSiteRepository::try_new(&conn).unwrap();
    let other = sites.create_site("other", "other.example.org").unwrap();
    let other = SiteContext::resolve(&sites, Some(other.id)).unwrap();
    let main = main_site(&conn);
    let service = service(&conn);

    service.create_event(&main, &CreateEventRequest::new("Main")).unwrap();
    service.create_event(&other, &CreateEventRequest::new("Other")).unwrap();

    let listed = service.list_events(Some(&other)).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Other");
    assert_eq!(service.list_events(None).unwrap().len(), 2);
}

#[test]
fn until_before_start_creates_event_without_occurrences() {
    let conn = open_db_in_memory().unwrap();
    let site = main_site(&conn);
    let service = service(&conn);

    let mut request = CreateEventRequest::new("Cancelled series");
    request.start_time = Some(at(2024, 3, 1, 9));
    request.rule = RecurrenceRule::new(Frequency::Daily).until(at(2024, 2, 1, 0));
    let event = service.create_event(&site, &request).unwrap();

    assert_eq!(service.get_event(event.id).unwrap().title, "Cancelled series");
    assert_eq!(occurrence_count(&conn), 0);
}
