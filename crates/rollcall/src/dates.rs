//! Meeting dates: the canonical date string, sheet header parsing, and the
//! weekly meeting schedule.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;

use crate::error::{Error, Result};

/// Format of the canonical date string used for header cells and history keys.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Alternate header formats accepted when reading hand-edited sheets.
const HEADER_FORMATS: &[&str] = &[CANONICAL_FORMAT, "%d/%m/%Y", "%d.%m.%Y", "%d %b %Y", "%d %B %Y"];

fn weekday_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+")
            .expect("weekday prefix pattern is valid")
    })
}

/// Render a date as its canonical string.
#[must_use]
pub fn canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_FORMAT).to_string()
}

/// Parse a sheet header cell into a date.
///
/// Accepts the canonical form plus the formats people type by hand, with an
/// optional leading weekday (`Thursday, 7 Mar 2024`). Returns `None` for
/// anything else, including the fixed id/name/status headers.
#[must_use]
pub fn parse_header(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = weekday_prefix().replace(trimmed, "");
    HEADER_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&stripped, format).ok())
}

/// Parse a date typed by a user, with the same rules as sheet headers.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not a recognizable date.
pub fn parse_user_date(text: &str) -> Result<NaiveDate> {
    parse_header(text).ok_or_else(|| Error::invalid_input(format!("not a date: {text}")))
}

/// The weekly meeting: a weekday and a start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingSchedule {
    /// Day of the week the meeting happens on.
    pub weekday: Weekday,
    /// Local start time.
    pub start_time: NaiveTime,
}

impl Default for MeetingSchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Thu,
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
        }
    }
}

impl MeetingSchedule {
    /// Build a schedule from configuration strings (`thu`, `19:00`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if either value does not parse.
    pub fn parse(weekday: &str, start_time: &str) -> Result<Self> {
        let weekday = weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid meeting weekday: {weekday}"),
            })?;
        let start_time = NaiveTime::parse_from_str(start_time.trim(), "%H:%M").map_err(|_| {
            Error::ConfigValidation {
                message: format!("invalid meeting start_time (expected HH:MM): {start_time}"),
            }
        })?;
        Ok(Self {
            weekday,
            start_time,
        })
    }

    /// The meeting day a roll call on `today` refers to: today when today is
    /// the meeting weekday, otherwise the next one.
    #[must_use]
    pub fn upcoming_date(&self, today: NaiveDate) -> NaiveDate {
        let target = i64::from(self.weekday.num_days_from_monday());
        let current = i64::from(today.weekday().num_days_from_monday());
        today + Duration::days((target - current).rem_euclid(7))
    }

    /// The next meeting start strictly after `now`.
    #[must_use]
    pub fn next_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        let candidate = self.upcoming_date(now.date()).and_time(self.start_time);
        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(7)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_canonical_format() {
        assert_eq!(canonical(date(2024, 3, 7)), "2024-03-07");
    }

    #[test]
    fn test_parse_header_formats() {
        let expected = date(2024, 3, 7);
        assert_eq!(parse_header("2024-03-07"), Some(expected));
        assert_eq!(parse_header("07/03/2024"), Some(expected));
        assert_eq!(parse_header("07.03.2024"), Some(expected));
        assert_eq!(parse_header("7 Mar 2024"), Some(expected));
        assert_eq!(parse_header("7 March 2024"), Some(expected));
        assert_eq!(parse_header("  2024-03-07 "), Some(expected));
    }

    #[test]
    fn test_parse_header_with_weekday_prefix() {
        let expected = date(2024, 3, 7);
        assert_eq!(parse_header("Thursday, 7 Mar 2024"), Some(expected));
        assert_eq!(parse_header("Thu 07/03/2024"), Some(expected));
    }

    #[test]
    fn test_parse_header_rejects_non_dates() {
        assert_eq!(parse_header(""), None);
        assert_eq!(parse_header("Name"), None);
        assert_eq!(parse_header("Status"), None);
        assert_eq!(parse_header("2024-13-40"), None);
    }

    #[test]
    fn test_parse_user_date_error() {
        let err = parse_user_date("next week").unwrap_err();
        assert!(err.to_string().contains("next week"));
    }

    #[test]
    fn test_upcoming_date() {
        let schedule = MeetingSchedule::default();
        // 2024-03-07 is a Thursday.
        assert_eq!(schedule.upcoming_date(date(2024, 3, 7)), date(2024, 3, 7));
        assert_eq!(schedule.upcoming_date(date(2024, 3, 4)), date(2024, 3, 7));
        assert_eq!(schedule.upcoming_date(date(2024, 3, 8)), date(2024, 3, 14));
        assert_eq!(schedule.upcoming_date(date(2024, 3, 10)), date(2024, 3, 14));
    }

    #[test]
    fn test_next_start() {
        let schedule = MeetingSchedule::default();
        let before = date(2024, 3, 7).and_hms_opt(18, 0, 0).unwrap();
        let after = date(2024, 3, 7).and_hms_opt(20, 0, 0).unwrap();
        assert_eq!(
            schedule.next_start(before),
            date(2024, 3, 7).and_hms_opt(19, 0, 0).unwrap()
        );
        assert_eq!(
            schedule.next_start(after),
            date(2024, 3, 14).and_hms_opt(19, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_schedule_parse() {
        let schedule = MeetingSchedule::parse("tue", "18:30").unwrap();
        assert_eq!(schedule.weekday, Weekday::Tue);
        assert_eq!(schedule.start_time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());

        assert!(MeetingSchedule::parse("someday", "18:30").is_err());
        assert!(MeetingSchedule::parse("tue", "6pm").is_err());
    }
}
