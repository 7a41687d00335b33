//! Typed recurrence rule with RFC 5545 text form.
//!
//! `RecurrenceRule` renders to the `RRULE` value syntax (`FREQ=WEEKLY;COUNT=4`)
//! and parses from it. Exclusion dates are kept alongside the rule but are not
//! part of the rendered text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const UNTIL_DATE_FORMAT: &str = "%Y%m%d";

/// Recurrence frequency (`FREQ`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    #[default]
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    pub fn as_ical(self) -> &'static str {
        match self {
            Self::Yearly => "YEARLY",
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
            Self::Daily => "DAILY",
            Self::Hourly => "HOURLY",
            Self::Minutely => "MINUTELY",
            Self::Secondly => "SECONDLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = InvalidRuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "YEARLY" => Ok(Self::Yearly),
            "MONTHLY" => Ok(Self::Monthly),
            "WEEKLY" => Ok(Self::Weekly),
            "DAILY" => Ok(Self::Daily),
            "HOURLY" => Ok(Self::Hourly),
            "MINUTELY" => Ok(Self::Minutely),
            "SECONDLY" => Ok(Self::Secondly),
            _ => Err(InvalidRuleError::UnknownFrequency(value.trim().to_string())),
        }
    }
}

/// One `BYDAY` entry, e.g. `MO` or `-1FR` (last Friday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByWeekday {
    pub ordinal: Option<i16>,
    pub weekday: Weekday,
}

impl ByWeekday {
    pub fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    pub fn nth(ordinal: i16, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl Display for ByWeekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{ordinal}")?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

impl FromStr for ByWeekday {
    type Err = InvalidRuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() < 2 || !value.is_char_boundary(value.len() - 2) {
            return Err(InvalidRuleError::Malformed(format!("invalid BYDAY entry `{value}`")));
        }
        let (ordinal_text, code) = value.split_at(value.len() - 2);
        let weekday = parse_weekday_code(code)?;
        let ordinal = if ordinal_text.is_empty() {
            None
        } else {
            let parsed = ordinal_text.trim_start_matches('+').parse::<i16>().map_err(|_| {
                InvalidRuleError::Malformed(format!("invalid BYDAY ordinal in `{value}`"))
            })?;
            if parsed == 0 || !(-53..=53).contains(&parsed) {
                return Err(InvalidRuleError::Malformed(format!(
                    "BYDAY ordinal out of range in `{value}`"
                )));
            }
            Some(parsed)
        };
        Ok(Self { ordinal, weekday })
    }
}

/// Recurrence specification following RFC 5545 `RRULE` naming.
///
/// A rule is *bounded* when it carries `count` or `until`; only bounded rules
/// are expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: Option<u16>,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub wkst: Option<Weekday>,
    pub by_set_pos: Vec<i32>,
    pub by_month: Vec<u8>,
    pub by_month_day: Vec<i8>,
    pub by_year_day: Vec<i16>,
    pub by_week_no: Vec<i8>,
    pub by_weekday: Vec<ByWeekday>,
    pub by_hour: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_second: Vec<u8>,
    /// Generated starts to omit (`EXDATE`).
    pub exdates: BTreeSet<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: u16) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn by_weekday(mut self, weekdays: impl IntoIterator<Item = ByWeekday>) -> Self {
        self.by_weekday = weekdays.into_iter().collect();
        self
    }

    pub fn by_month_day(mut self, days: impl IntoIterator<Item = i8>) -> Self {
        self.by_month_day = days.into_iter().collect();
        self
    }

    pub fn exclude(mut self, start: DateTime<Utc>) -> Self {
        self.exdates.insert(start);
        self
    }

    /// Whether `count` or `until` limits generation.
    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Checks the constraints enforced before any generation happens.
    ///
    /// Range checks on `BY*` values are left to the rule engine.
    pub fn validate(&self) -> Result<(), InvalidRuleError> {
        if self.count.is_some() && self.until.is_some() {
            return Err(InvalidRuleError::CountAndUntil);
        }
        if self.count == Some(0) {
            return Err(InvalidRuleError::ZeroCount);
        }
        if self.interval == Some(0) {
            return Err(InvalidRuleError::ZeroInterval);
        }
        Ok(())
    }
}

impl Display for RecurrenceRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FREQ={}", self.freq.as_ical())?;
        if let Some(interval) = self.interval {
            write!(f, ";INTERVAL={interval}")?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format(UNTIL_FORMAT))?;
        }
        if let Some(wkst) = self.wkst {
            write!(f, ";WKST={}", weekday_code(wkst))?;
        }
        write_list(f, "BYSETPOS", &self.by_set_pos)?;
        write_list(f, "BYMONTH", &self.by_month)?;
        write_list(f, "BYMONTHDAY", &self.by_month_day)?;
        write_list(f, "BYYEARDAY", &self.by_year_day)?;
        write_list(f, "BYWEEKNO", &self.by_week_no)?;
        write_list(f, "BYDAY", &self.by_weekday)?;
        write_list(f, "BYHOUR", &self.by_hour)?;
        write_list(f, "BYMINUTE", &self.by_minute)?;
        write_list(f, "BYSECOND", &self.by_second)?;
        Ok(())
    }
}

impl FromStr for RecurrenceRule {
    type Err = InvalidRuleError;

    /// Parses `RRULE` value text, with or without the `RRULE:` prefix.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let text = value.trim();
        let text = text
            .strip_prefix("RRULE:")
            .or_else(|| text.strip_prefix("rrule:"))
            .unwrap_or(text);

        let mut rule = Self::default();
        let mut seen = BTreeSet::new();
        for part in text.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, raw) = part
                .split_once('=')
                .ok_or_else(|| InvalidRuleError::Malformed(format!("missing `=` in `{part}`")))?;
            let key = key.trim().to_ascii_uppercase();
            if !seen.insert(key.clone()) {
                return Err(InvalidRuleError::Malformed(format!("duplicate rule part `{key}`")));
            }
            let raw = raw.trim();
            match key.as_str() {
                "FREQ" => rule.freq = raw.parse()?,
                "INTERVAL" => rule.interval = Some(parse_number(&key, raw)?),
                "COUNT" => rule.count = Some(parse_number(&key, raw)?),
                "UNTIL" => rule.until = Some(parse_until(raw)?),
                "WKST" => rule.wkst = Some(parse_weekday_code(raw)?),
                "BYSETPOS" => rule.by_set_pos = parse_list(&key, raw)?,
                "BYMONTH" => rule.by_month = parse_list(&key, raw)?,
                "BYMONTHDAY" => rule.by_month_day = parse_list(&key, raw)?,
                "BYYEARDAY" => rule.by_year_day = parse_list(&key, raw)?,
                "BYWEEKNO" => rule.by_week_no = parse_list(&key, raw)?,
                "BYDAY" => {
                    rule.by_weekday = raw
                        .split(',')
                        .map(str::parse)
                        .collect::<Result<Vec<ByWeekday>, _>>()?;
                }
                "BYHOUR" => rule.by_hour = parse_list(&key, raw)?,
                "BYMINUTE" => rule.by_minute = parse_list(&key, raw)?,
                "BYSECOND" => rule.by_second = parse_list(&key, raw)?,
                other => {
                    return Err(InvalidRuleError::Malformed(format!(
                        "unsupported rule part `{other}`"
                    )));
                }
            }
        }

        // A missing FREQ keeps the DAILY default.
        rule.validate()?;
        Ok(rule)
    }
}

/// Error raised for rules that cannot be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRuleError {
    /// Both `COUNT` and `UNTIL` were supplied.
    CountAndUntil,
    UnknownFrequency(String),
    ZeroCount,
    ZeroInterval,
    /// The requested span ends before it starts.
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Rule text could not be parsed.
    Malformed(String),
    /// The rule engine refused the rule (e.g. out-of-range `BY*` values).
    Rejected(String),
    /// Expansion would produce more occurrences than allowed.
    TooManyOccurrences { limit: usize },
}

impl Display for InvalidRuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CountAndUntil => write!(f, "recurrence rule cannot set both COUNT and UNTIL"),
            Self::UnknownFrequency(value) => write!(f, "unknown recurrence frequency `{value}`"),
            Self::ZeroCount => write!(f, "recurrence COUNT must be positive"),
            Self::ZeroInterval => write!(f, "recurrence INTERVAL must be positive"),
            Self::EndBeforeStart { start, end } => write!(
                f,
                "occurrence end `{}` is earlier than start `{}`",
                end.to_rfc3339(),
                start.to_rfc3339()
            ),
            Self::Malformed(message) => write!(f, "malformed recurrence rule: {message}"),
            Self::Rejected(message) => write!(f, "recurrence rule rejected: {message}"),
            Self::TooManyOccurrences { limit } => write!(
                f,
                "recurrence rule expands to more than {limit} occurrences"
            ),
        }
    }
}

impl Error for InvalidRuleError {}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday_code(code: &str) -> Result<Weekday, InvalidRuleError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(InvalidRuleError::Malformed(format!("unknown weekday `{other}`"))),
    }
}

fn parse_until(raw: &str) -> Result<DateTime<Utc>, InvalidRuleError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, UNTIL_FORMAT) {
        return Ok(naive.and_utc());
    }
    // DATE form: the whole day is included.
    NaiveDate::parse_from_str(raw, UNTIL_DATE_FORMAT)
        .ok()
        .and_then(|date| NaiveTime::from_hms_opt(23, 59, 59).map(|time| date.and_time(time)))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| InvalidRuleError::Malformed(format!("invalid UNTIL value `{raw}`")))
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, InvalidRuleError> {
    raw.parse::<T>()
        .map_err(|_| InvalidRuleError::Malformed(format!("invalid {key} value `{raw}`")))
}

fn parse_list<T: FromStr>(key: &str, raw: &str) -> Result<Vec<T>, InvalidRuleError> {
    raw.split(',')
        .map(|item| parse_number(key, item.trim()))
        .collect()
}

fn write_list<T: Display>(f: &mut Formatter<'_>, key: &str, values: &[T]) -> std::fmt::Result {
    if values.is_empty() {
        return Ok(());
    }
    write!(f, ";{key}=")?;
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            f.write_str(",")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}
