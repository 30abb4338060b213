//! Date and recurrence expressions.
//!
//! One-shot alerts are stored as a canonical local timestamp
//! (`YYYY-MM-DD HH:MM`). User input is more forgiving and gets normalised
//! by [`resolve_one_shot`] before anything is written.
//!
//! Recurring alerts keep their expression verbatim and are matched against
//! the clock on every poll:
//!
//! ```text
//! recurrence := [days] [at] [HH:MM]
//! days       := daily | every day | weekdays | weekends
//!             | <weekday>[,<weekday>...]
//!             | <day-of-month> <month>        (yearly)
//! ```
//!
//! The time defaults to midnight; a bare `HH:MM` means every day.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex::Regex;
use std::sync::LazyLock;

use crate::alerts::error::TimespecError;

/// Canonical on-disk format for one-shot timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

static ABSOLUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2})[ t]+(\d{1,2}:\d{2})$").unwrap());

static DAY_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(today|tomorrow)\s+)?(?:at\s+)?(\d{1,2}:\d{2})$").unwrap());

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+|in\s+)(\d+)\s*(m|mins?|minutes?|h|hrs?|hours?|d|days?)$").unwrap()
});

static YEARLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s+([a-z]+)$").unwrap());

/// Drop seconds and sub-second precision
pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Render a timestamp in the canonical store format
pub fn format_timestamp(dt: NaiveDateTime) -> String {
    truncate_to_minute(dt).format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored one-shot timestamp
///
/// Only absolute forms are accepted here: relative input such as
/// `tomorrow 10:00` has no stable meaning once it is on disk.
pub fn parse_timestamp(spec: &str) -> Result<NaiveDateTime, TimespecError> {
    let normalized = spec.trim().to_lowercase();
    let caps = ABSOLUTE_RE
        .captures(&normalized)
        .ok_or_else(|| TimespecError::new(spec, "expected YYYY-MM-DD HH:MM"))?;

    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
        .map_err(|e| TimespecError::new(spec, format!("bad date: {e}")))?;
    let time = parse_time(&caps[2]).ok_or_else(|| TimespecError::new(spec, "bad time of day"))?;

    Ok(date.and_time(time))
}

/// Resolve user input for a one-shot alert to an absolute minute
///
/// Accepts `YYYY-MM-DD HH:MM`, `HH:MM` (next occurrence of that time),
/// `today HH:MM`, `tomorrow HH:MM`, `+N{m,h,d}` and `in N minutes|hours|days`.
pub fn resolve_one_shot(spec: &str, now: NaiveDateTime) -> Result<NaiveDateTime, TimespecError> {
    let now = truncate_to_minute(now);
    let normalized = spec.trim().to_lowercase();

    if ABSOLUTE_RE.is_match(&normalized) {
        return parse_timestamp(&normalized);
    }

    if let Some(caps) = DAY_TIME_RE.captures(&normalized) {
        let time =
            parse_time(&caps[2]).ok_or_else(|| TimespecError::new(spec, "bad time of day"))?;
        let today = now.date().and_time(time);
        let resolved = match caps.get(1).map(|m| m.as_str()) {
            Some("today") => today,
            Some(_) => today + Duration::days(1),
            None if today < now => today + Duration::days(1),
            None => today,
        };
        return Ok(resolved);
    }

    if let Some(caps) = RELATIVE_RE.captures(&normalized) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| TimespecError::new(spec, "offset out of range"))?;
        let offset = match caps[2].chars().next() {
            Some('m') => Duration::try_minutes(amount),
            Some('h') => Duration::try_hours(amount),
            _ => Duration::try_days(amount),
        }
        .ok_or_else(|| TimespecError::new(spec, "offset out of range"))?;
        return now
            .checked_add_signed(offset)
            .ok_or_else(|| TimespecError::new(spec, "offset out of range"));
    }

    Err(TimespecError::new(
        spec,
        "expected YYYY-MM-DD HH:MM, HH:MM, today/tomorrow HH:MM, or +N{m,h,d}",
    ))
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let caps = TIME_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    let day = match name {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn parse_month(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|full| full.starts_with(name))
        .map(|idx| idx as u32 + 1)
}

/// Which calendar days a recurring alert fires on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySet {
    Every,
    /// Indexed by `Weekday::num_days_from_monday`
    Weekdays([bool; 7]),
    Yearly { month: u32, day: u32 },
}

impl DaySet {
    fn from_weekdays(days: &[Weekday]) -> Self {
        let mut mask = [false; 7];
        for day in days {
            mask[day.num_days_from_monday() as usize] = true;
        }
        DaySet::Weekdays(mask)
    }

    fn contains(&self, date: NaiveDate) -> bool {
        match self {
            DaySet::Every => true,
            DaySet::Weekdays(mask) => mask[date.weekday().num_days_from_monday() as usize],
            DaySet::Yearly { month, day } => date.month() == *month && date.day() == *day,
        }
    }
}

/// A parsed recurrence expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    pub days: DaySet,
    pub time: NaiveTime,
}

impl Recurrence {
    /// Whether `at` is exactly an occurrence (minute resolution)
    pub fn occurs_at(&self, at: NaiveDateTime) -> bool {
        let at = truncate_to_minute(at);
        at.time() == self.time && self.days.contains(at.date())
    }

    /// Whether any occurrence falls in the half-open window `(start, end]`
    pub fn occurs_within(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        if end <= start {
            return false;
        }

        start
            .date()
            .iter_days()
            .take_while(|date| *date <= end.date())
            .filter(|date| self.days.contains(*date))
            .map(|date| date.and_time(self.time))
            .any(|candidate| candidate > start && candidate <= end)
    }
}

impl std::str::FromStr for Recurrence {
    type Err = TimespecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let normalized = spec.trim().to_lowercase();
        let mut tokens: Vec<&str> = normalized.split_whitespace().collect();

        let mut time = None;
        if let Some(last) = tokens.last() {
            if TIME_RE.is_match(last) {
                time = Some(
                    parse_time(last).ok_or_else(|| TimespecError::new(spec, "bad time of day"))?,
                );
                tokens.pop();
                if tokens.last() == Some(&"at") {
                    tokens.pop();
                }
            }
        }

        let days_part = tokens.join(" ");
        let days = match days_part.as_str() {
            "" if time.is_some() => DaySet::Every,
            "" => return Err(TimespecError::new(spec, "empty recurrence")),
            "daily" | "every day" | "everyday" => DaySet::Every,
            "weekdays" => DaySet::from_weekdays(&[
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]),
            "weekends" => DaySet::from_weekdays(&[Weekday::Sat, Weekday::Sun]),
            other => {
                if let Some(caps) = YEARLY_RE.captures(other) {
                    let day: u32 = caps[1]
                        .parse()
                        .map_err(|_| TimespecError::new(spec, "bad day of month"))?;
                    let month = parse_month(&caps[2])
                        .ok_or_else(|| TimespecError::new(spec, "unknown month name"))?;
                    // 2024 is a leap year, so 29 feb is accepted
                    NaiveDate::from_ymd_opt(2024, month, day)
                        .ok_or_else(|| TimespecError::new(spec, "no such calendar day"))?;
                    DaySet::Yearly { month, day }
                } else {
                    let names = other
                        .split([',', ' '])
                        .filter(|name| !name.is_empty());
                    let mut weekdays = Vec::new();
                    for name in names {
                        let day = parse_weekday(name).ok_or_else(|| {
                            TimespecError::new(spec, format!("unknown day {name:?}"))
                        })?;
                        weekdays.push(day);
                    }
                    DaySet::from_weekdays(&weekdays)
                }
            }
        };

        Ok(Recurrence {
            days,
            time: time.unwrap_or(NaiveTime::MIN),
        })
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let time = self.time.format("%H:%M");
        match &self.days {
            DaySet::Every => write!(f, "every day at {time}"),
            DaySet::Weekdays(mask) => {
                let names: Vec<String> = (0..7u8)
                    .filter(|idx| mask[*idx as usize])
                    .filter_map(|idx| Weekday::try_from(idx).ok())
                    .map(|day| day.to_string())
                    .collect();
                write!(f, "every {} at {time}", names.join(", "))
            }
            DaySet::Yearly { month, day } => {
                let label = NaiveDate::from_ymd_opt(2024, *month, *day)
                    .map(|d| d.format("%-d %B").to_string())
                    .unwrap_or_else(|| format!("{day}/{month}"));
                write!(f, "every {label} at {time}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn parses_canonical_timestamp() {
        assert_eq!(parse_timestamp("2024-01-01 10:00").unwrap(), at("2024-01-01 10:00"));
        assert_eq!(parse_timestamp("2024-01-01T10:00").unwrap(), at("2024-01-01 10:00"));
        assert_eq!(parse_timestamp(" 2024-1-2 7:05 ").unwrap(), at("2024-01-02 07:05"));
    }

    #[test]
    fn rejects_invalid_timestamps() {
        assert!(parse_timestamp("2024-13-01 10:00").is_err());
        assert!(parse_timestamp("2024-01-01 25:00").is_err());
        assert!(parse_timestamp("tomorrow 10:00").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn format_drops_seconds() {
        let dt = at("2024-01-01 10:00") + Duration::seconds(42);
        assert_eq!(format_timestamp(dt), "2024-01-01 10:00");
    }

    #[test]
    fn resolves_time_of_day_to_next_occurrence() {
        let now = at("2024-03-10 12:00");
        assert_eq!(resolve_one_shot("13:30", now).unwrap(), at("2024-03-10 13:30"));
        assert_eq!(resolve_one_shot("08:00", now).unwrap(), at("2024-03-11 08:00"));
        assert_eq!(resolve_one_shot("12:00", now).unwrap(), at("2024-03-10 12:00"));
    }

    #[test]
    fn resolves_today_and_tomorrow() {
        let now = at("2024-03-10 12:00");
        assert_eq!(resolve_one_shot("today 08:00", now).unwrap(), at("2024-03-10 08:00"));
        assert_eq!(resolve_one_shot("Tomorrow at 9:15", now).unwrap(), at("2024-03-11 09:15"));
    }

    #[test]
    fn resolves_relative_offsets() {
        let now = at("2024-03-10 23:50") + Duration::seconds(30);
        assert_eq!(resolve_one_shot("+15m", now).unwrap(), at("2024-03-11 00:05"));
        assert_eq!(resolve_one_shot("in 2 hours", now).unwrap(), at("2024-03-11 01:50"));
        assert_eq!(resolve_one_shot("+1d", now).unwrap(), at("2024-03-11 23:50"));
    }

    #[test]
    fn resolve_rejects_garbage() {
        let now = at("2024-03-10 12:00");
        assert!(resolve_one_shot("someday", now).is_err());
        assert!(resolve_one_shot("friday", now).is_err());
        assert!(resolve_one_shot("+m", now).is_err());
    }

    #[test]
    fn parses_recurrence_forms() {
        let daily: Recurrence = "08:30".parse().unwrap();
        assert_eq!(daily.days, DaySet::Every);
        assert_eq!(daily.time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());

        let friday: Recurrence = "Friday".parse().unwrap();
        assert_eq!(friday.time, NaiveTime::MIN);
        assert!(friday.occurs_at(at("2024-03-08 00:00")));

        let list: Recurrence = "mon,wed fri at 17:00".parse().unwrap();
        assert!(list.occurs_at(at("2024-03-06 17:00")));
        assert!(!list.occurs_at(at("2024-03-07 17:00")));

        let yearly: Recurrence = "1 may 20:00".parse().unwrap();
        assert_eq!(yearly.days, DaySet::Yearly { month: 5, day: 1 });
        assert!(yearly.occurs_at(at("2025-05-01 20:00")));
    }

    #[test]
    fn weekdays_and_weekends() {
        let weekdays: Recurrence = "weekdays 09:00".parse().unwrap();
        // 2024-03-09 is a Saturday
        assert!(!weekdays.occurs_at(at("2024-03-09 09:00")));
        assert!(weekdays.occurs_at(at("2024-03-11 09:00")));

        let weekends: Recurrence = "weekends 10:00".parse().unwrap();
        assert!(weekends.occurs_at(at("2024-03-10 10:00")));
        assert!(!weekends.occurs_at(at("2024-03-11 10:00")));
    }

    #[test]
    fn rejects_bad_recurrences() {
        assert!("".parse::<Recurrence>().is_err());
        assert!("funday 10:00".parse::<Recurrence>().is_err());
        assert!("31 feb".parse::<Recurrence>().is_err());
        assert!("daily 24:00".parse::<Recurrence>().is_err());
        assert!("1 mayo 10:00".parse::<Recurrence>().is_err());
    }

    #[test]
    fn window_is_half_open() {
        let daily: Recurrence = "10:00".parse().unwrap();
        assert!(daily.occurs_within(at("2024-03-10 09:59"), at("2024-03-10 10:00")));
        assert!(!daily.occurs_within(at("2024-03-10 10:00"), at("2024-03-10 10:01")));
        assert!(!daily.occurs_within(at("2024-03-10 10:00"), at("2024-03-10 10:00")));
    }

    #[test]
    fn window_spanning_midnight() {
        let friday: Recurrence = "fri 00:00".parse().unwrap();
        assert!(friday.occurs_within(at("2024-03-07 23:58"), at("2024-03-08 00:01")));
    }

    #[test]
    fn display_is_human_readable() {
        let rec: Recurrence = "mon,fri 09:05".parse().unwrap();
        assert_eq!(rec.to_string(), "every Mon, Fri at 09:05");
        let yearly: Recurrence = "1 may 20:00".parse().unwrap();
        assert_eq!(yearly.to_string(), "every 1 May at 20:00");
    }
}
