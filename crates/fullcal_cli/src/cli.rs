use std::env;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use fullcal_core::{RecurrenceRule, SiteId};
use getopts::{Matches, Options};

const DEFAULT_DB_PATH: &str = "fullcal.sqlite3";
const DEFAULT_ROUTE: &str = "/agenda/";

/// Event to create before rendering.
pub struct NewEventArgs {
    pub title: String,
    pub category: Option<String>,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub rule: RecurrenceRule,
}

pub struct Args {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub site_id: Option<SiteId>,
    pub limit: Option<u32>,
    pub now: Option<DateTime<Utc>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub add_site: Option<(String, String)>,
    pub add_event: Option<NewEventArgs>,
    pub route: String,
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "d",
        "db",
        "SQLite database file [Default: fullcal.sqlite3]",
        "PATH",
    );
    opts.optopt("c", "config", "JSON settings file", "PATH");
    opts.optopt(
        "s",
        "site",
        "Restrict views to one site; also the site new events belong to",
        "SITE_ID",
    );
    opts.optopt("n", "limit", "Maximum number of agenda entries", "COUNT");
    opts.optopt(
        "",
        "now",
        "Reference time for upcoming queries [Default: current time]",
        "RFC3339",
    );
    opts.optopt(
        "",
        "from",
        "First day of the JSON feed range [Default: first day of this month]",
        "YYYY-MM-DD",
    );
    opts.optopt(
        "",
        "to",
        "Last day of the JSON feed range [Default: last day of this month]",
        "YYYY-MM-DD",
    );
    opts.optopt("", "add-site", "Create a site before rendering", "NAME");
    opts.optopt("", "domain", "Domain of the site created with --add-site", "DOMAIN");
    opts.optopt("", "add-event", "Create an event before rendering", "TITLE");
    opts.optopt("", "category", "Category name of the new event", "NAME");
    opts.optopt("", "description", "Body text of the new event", "TEXT");
    opts.optopt(
        "",
        "start",
        "Start of the new event [Default: start of the current hour]",
        "RFC3339",
    );
    opts.optopt(
        "",
        "end",
        "End of the new event [Default: start plus the configured duration]",
        "RFC3339",
    );
    opts.optopt(
        "",
        "rule",
        "Recurrence rule of the new event, e.g. FREQ=WEEKLY;COUNT=4",
        "RRULE",
    );
    opts
}

pub fn parse(args: Vec<String>) -> Args {
    let opts = opts();

    let matches = match opts.parse(args) {
        Ok(matches) => matches,
        Err(fail) => {
            eprintln!("{fail}");
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        let brief = format!("{} [options] [ROUTE]", env!("CARGO_PKG_NAME"));
        println!("{}", opts.usage(&brief));
        process::exit(0);
    }

    let db_path = matches
        .opt_str("db")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let config_path = matches.opt_str("config").map(PathBuf::from);
    let site_id = parse_opt(&matches, "site", |value| value.parse::<SiteId>().map_err(|e| e.to_string()));
    let limit = parse_opt(&matches, "limit", |value| value.parse::<u32>().map_err(|e| e.to_string()));
    let now = parse_opt(&matches, "now", parse_timestamp);
    let from = parse_opt(&matches, "from", parse_date);
    let to = parse_opt(&matches, "to", parse_date);

    let add_site = matches.opt_str("add-site").map(|name| {
        let domain = matches.opt_str("domain").unwrap_or_default();
        (name, domain)
    });

    let add_event = matches.opt_str("add-event").map(|title| NewEventArgs {
        title,
        category: matches.opt_str("category"),
        description: matches.opt_str("description").unwrap_or_default(),
        start: parse_opt(&matches, "start", parse_timestamp),
        end: parse_opt(&matches, "end", parse_timestamp),
        rule: parse_opt(&matches, "rule", |value| {
            RecurrenceRule::from_str(value).map_err(|e| e.to_string())
        })
        .unwrap_or_default(),
    });

    let route = matches
        .free
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_ROUTE.to_string());

    Args {
        db_path,
        config_path,
        site_id,
        limit,
        now,
        from,
        to,
        add_site,
        add_event,
        route,
    }
}

fn parse_opt<T>(
    matches: &Matches,
    name: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Option<T> {
    let value = matches.opt_str(name)?;
    match parse(&value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            eprintln!("Provided value for option '{name}' is invalid: {err}");
            process::exit(1);
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| e.to_string())
}
