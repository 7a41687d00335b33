//! `fullcal` command-line entry point.
//!
//! # Responsibility
//! - Open a calendar database, optionally seed a site or event, then render
//!   the view a route path points at.
//! - Keep all calendar semantics in `fullcal_core`.

mod cli;

use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::process;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use cli::{Args, NewEventArgs};
use fullcal_core::service::agenda::{
    occurrence_duration, show_agenda, show_site_agenda, site_legend, AgendaView,
};
use fullcal_core::service::feed::calendar_feed_json;
use fullcal_core::{
    init_logging_from_settings, open_db, CalendarSettings, CategoryRef, CreateEventRequest,
    DateWindow, EventService, Occurrence, OccurrenceService, Route, SiteContext, SiteRepository,
    SqliteEventRepository, SqliteOccurrenceRepository, SqliteSiteRepository, MAIN_SITE_ID,
};
use log::info;
use rusqlite::Connection;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    let args = cli::parse(env::args().skip(1).collect());
    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(args: Args) -> CliResult<()> {
    let settings = match &args.config_path {
        Some(path) => CalendarSettings::load(path)?,
        None => CalendarSettings::default(),
    };
    init_logging_from_settings(&settings.log)?;
    let tz = settings.display_timezone()?;

    let conn = open_db(&args.db_path)?;
    let sites = SqliteSiteRepository::try_new(&conn)?;

    if let Some((name, domain)) = &args.add_site {
        let site = sites.create_site(name, domain)?;
        println!("created site {} ({})", site.id, site.name);
    }

    let site = match args.site_id {
        Some(id) => Some(SiteContext::resolve(&sites, Some(id))?),
        None => None,
    };

    if let Some(new_event) = &args.add_event {
        let owner = match &site {
            Some(site) => site.clone(),
            None => SiteContext::resolve(&sites, Some(MAIN_SITE_ID))?,
        };
        create_event(&conn, &settings, &owner, new_event)?;
    }

    let route = Route::resolve(&args.route)?;
    let now = args.now.unwrap_or_else(Utc::now);
    let occurrences = OccurrenceService::new(SqliteOccurrenceRepository::try_new(&conn)?);

    match route {
        Route::Agenda => {
            let view = match &site {
                Some(site) => show_site_agenda(&occurrences, site, Some(now), args.limit)?,
                None => show_agenda(&occurrences, Some(now), args.limit)?,
            };
            print_agenda(&view, &tz);
            if view.all_sites {
                print_legend(&settings, &sites)?;
            }
        }
        Route::Calendar => {
            let today = now.with_timezone(&tz).date_naive();
            let window = DateWindow::month(today.year(), today.month())
                .ok_or_else(|| format!("no calendar month for {today}"))?;
            let items = occurrences.in_window(window, site.as_ref())?;
            print_listing(&format!("{}", today.format("%B %Y")), &items, now, &tz);
        }
        Route::CalendarJson => {
            let window = feed_window(now, &tz, args.from, args.to)
                .ok_or("feed range ends before it starts")?;
            let items = occurrences.in_window(window, site.as_ref())?;
            println!("{}", calendar_feed_json(&items, &settings.site_colors, &tz)?);
        }
        Route::Year { year } => {
            let window = DateWindow::year(year).ok_or_else(|| format!("year {year} is out of range"))?;
            let items = occurrences.in_window(window, site.as_ref())?;
            let mut by_month: BTreeMap<u32, Vec<Occurrence>> = BTreeMap::new();
            for item in items {
                by_month
                    .entry(item.start_time.with_timezone(&tz).month())
                    .or_default()
                    .push(item);
            }
            println!("{year}");
            for (month, items) in &by_month {
                print_listing(&format!("{year}-{month:02}"), items, now, &tz);
            }
        }
        Route::Month { year, month } => {
            let window = DateWindow::month(year, month)
                .ok_or_else(|| format!("month {year}-{month:02} is out of range"))?;
            let items = occurrences.in_window(window, site.as_ref())?;
            print_listing(&format!("{year}-{month:02}"), &items, now, &tz);
        }
        Route::Event { id } => {
            let events = EventService::with_settings(
                SqliteEventRepository::try_new(&conn)?,
                SqliteOccurrenceRepository::try_new(&conn)?,
                &settings,
            );
            let event = events.get_event(id)?;
            println!("{} [{}]", event.title, event.slug);
            if !event.content.is_empty() {
                println!("{}", event.content);
            }
            let upcoming = events.upcoming_occurrences(id, Some(now))?;
            print_listing("upcoming", &upcoming, now, &tz);
        }
    }

    info!(
        "event=cli_render module=cli status=ok route={}",
        route.name()
    );
    Ok(())
}

/// Feed range: `from..=to` when given, otherwise the month of `from`,
/// defaulting to the current month in `tz`.
fn feed_window<Z: TimeZone>(
    now: DateTime<Utc>,
    tz: &Z,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Option<DateWindow> {
    let today = now.with_timezone(tz).date_naive();
    let first = from.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    match to {
        Some(last) => DateWindow::days(first, last),
        None => DateWindow::month(first.year(), first.month()),
    }
}

fn create_event(
    conn: &Connection,
    settings: &CalendarSettings,
    owner: &SiteContext,
    args: &NewEventArgs,
) -> CliResult<()> {
    let service = EventService::with_settings(
        SqliteEventRepository::try_new(conn)?,
        SqliteOccurrenceRepository::try_new(conn)?,
        settings,
    );
    let mut request = CreateEventRequest::new(args.title.clone());
    request.category = args.category.clone().map(CategoryRef::Name);
    request.description = args.description.clone();
    request.start_time = args.start;
    request.end_time = args.end;
    request.rule = args.rule.clone();

    let event = service.create_event(owner, &request)?;
    println!(
        "created event {} at {}",
        event.id,
        Route::Event { id: event.id }.reverse()
    );
    Ok(())
}

fn print_agenda<Z>(view: &AgendaView, tz: &Z)
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    if view.occurrences.is_empty() {
        println!("no upcoming occurrences");
        return;
    }
    for item in &view.occurrences {
        println!("{}", occurrence_duration(item, tz));
        println!("  {} {}", item.title(), item.absolute_url());
    }
}

fn print_legend(settings: &CalendarSettings, sites: &SqliteSiteRepository<'_>) -> CliResult<()> {
    let legend = site_legend(&settings.site_colors, &sites.list_sites()?);
    for (name, colors) in &legend {
        println!(
            "{name}: background={} text={} border={}",
            colors.background_color, colors.text_color, colors.border_color
        );
    }
    Ok(())
}

fn print_listing<Z>(heading: &str, items: &[Occurrence], now: DateTime<Utc>, tz: &Z)
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    println!("{heading}");
    for item in items {
        let marker = if item.in_past(now) { " (past)" } else { "" };
        println!(
            "  {} {}{marker}",
            item.start_time.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            item.title()
        );
    }
}
