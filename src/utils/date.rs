//! Date parsing and formatting in a configured timezone.
//!
//! Short forms (`YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`) are interpreted in the
//! document's timezone; RFC 3339 and explicit-offset forms are taken as-is.

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone as _,
    format::{Item, StrftimeItems},
};
use std::{fmt, str::FromStr};

/// A parsed date keeps the offset it was read with.
pub type Date = DateTime<FixedOffset>;

/// Timezone for interpreting dates without an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZone {
    #[default]
    Local,
    Named(chrono_tz::Tz),
}

impl FromStr for TimeZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Local" => Ok(Self::Local),
            name => name
                .parse::<chrono_tz::Tz>()
                .map(Self::Named)
                .map_err(|_| format!("illegal timezone: \"{name}\"")),
        }
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("Local"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl TimeZone {
    /// Attach this zone to a naive local time (earliest reading when ambiguous).
    fn localize(self, naive: NaiveDateTime) -> Option<Date> {
        fn pick<Tz: chrono::TimeZone>(r: LocalResult<DateTime<Tz>>) -> Option<Date> {
            match r {
                LocalResult::Single(d) | LocalResult::Ambiguous(d, _) => Some(d.fixed_offset()),
                LocalResult::None => None,
            }
        }
        match self {
            Self::Local => pick(Local.from_local_datetime(&naive)),
            Self::Named(tz) => pick(tz.from_local_datetime(&naive)),
        }
    }

    /// Express `date` in this zone.
    pub fn convert(self, date: &Date) -> Date {
        match self {
            Self::Local => date.with_timezone(&Local).fixed_offset(),
            Self::Named(tz) => {
                let offset = tz.offset_from_utc_datetime(&date.naive_utc()).fix();
                date.with_timezone(&offset)
            }
        }
    }
}

/// Parse a date string, trying RFC 3339, `YYYY-MM-DD HH:MM:SS±HH:MM`, then
/// the short forms in `tz`.
pub fn parse_date(text: &str, tz: TimeZone) -> Result<Date, String> {
    let text = text.trim();
    let illegal = || format!("illegal date value: \"{text}\"");
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Ok(d);
    }
    if let Ok(d) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(d);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| illegal())?;
    tz.localize(naive).ok_or_else(illegal)
}

/// Reject strftime strings chrono cannot format.
pub fn validate_format(format: &str) -> Result<(), String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("illegal date format: \"{format}\""));
    }
    Ok(())
}

/// Format `date` in `tz`; empty when there is no date.
pub fn format_date(date: Option<&Date>, tz: TimeZone, format: &str) -> String {
    date.map(|d| tz.convert(d).format(format).to_string())
        .unwrap_or_default()
}

/// RFC 3339 rendering used in template data; empty when unset.
pub fn rfc3339(date: Option<&Date>) -> String {
    date.map(Date::to_rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn utc() -> TimeZone {
        "UTC".parse().unwrap()
    }

    #[test]
    fn test_parse_short_date() {
        let d = parse_date("2024-01-02", utc()).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 1, 2));
        assert_eq!(d.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_named_zone() {
        let tz: TimeZone = "Pacific/Auckland".parse().unwrap();
        let d = parse_date("2024-01-02 10:30:00", tz).unwrap();
        assert_eq!(d.hour(), 10);
        assert_eq!(d.offset().local_minus_utc(), 13 * 3600);
    }

    #[test]
    fn test_parse_offsets() {
        let d = parse_date("2024-01-02T03:04:05+02:00", utc()).unwrap();
        assert_eq!(d.offset().local_minus_utc(), 2 * 3600);
        let d = parse_date("2024-01-02 03:04:05-05:00", utc()).unwrap();
        assert_eq!(d.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_parse_illegal() {
        let err = parse_date(" 2024-13-02 ", utc()).unwrap_err();
        assert_eq!(err, "illegal date value: \"2024-13-02\"");
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!("Local".parse::<TimeZone>().unwrap(), TimeZone::Local);
        assert!("Mars/Olympus".parse::<TimeZone>().is_err());
        assert_eq!(utc().to_string(), "UTC");
    }

    #[test]
    fn test_format() {
        let d = parse_date("2023-07-05", utc()).unwrap();
        assert_eq!(format_date(Some(&d), utc(), "%Y-%m-%d"), "2023-07-05");
        assert_eq!(format_date(Some(&d), utc(), "%-d-%b-%Y"), "5-Jul-2023");
        assert_eq!(format_date(None, utc(), "%Y"), "");
        assert_eq!(rfc3339(Some(&d)), "2023-07-05T00:00:00+00:00");
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("%a %b %-d, %Y").is_ok());
        assert!(validate_format("%Q").is_err());
    }
}
