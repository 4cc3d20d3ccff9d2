//! Conversions between stored UTC instants and the strings clients see.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Zone every exported timestamp is rendered in.
pub const DISPLAY_TZ: Tz = chrono_tz::America::Bogota;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid ISO-8601 instant: {0:?}")]
pub struct InvalidInstant(pub String);

/// Renders an instant in Bogota local time, `YYYY-MM-DD HH:MM:SS`, no offset.
pub fn to_display_time(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&DISPLAY_TZ)
        .format(DISPLAY_FORMAT)
        .to_string()
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-06-01T17:00:00.000Z`.
pub fn to_api_time(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a caller-supplied ISO-8601 date or date-time.
///
/// Values without an offset are taken as UTC. A bare date means midnight UTC.
/// A trailing `Z` or `±HH:MM` offset is honoured and converted to UTC.
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>, InvalidInstant> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }

    // `Z` is shorthand for +00:00; the fallback formats below only know `%:z`.
    let normalized = match text.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => text.to_string(),
    };

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(InvalidInstant(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn display_time_is_five_hours_behind_utc() {
        assert_eq!(to_display_time(utc(2024, 6, 1, 17, 0, 0)), "2024-06-01 12:00:00");
    }

    #[test]
    fn display_time_rolls_back_the_date() {
        assert_eq!(to_display_time(utc(2024, 1, 1, 3, 30, 15)), "2023-12-31 22:30:15");
    }

    #[test]
    fn display_time_drops_fractional_seconds() {
        let instant = utc(2024, 6, 1, 17, 0, 0) + chrono::Duration::milliseconds(987);
        assert_eq!(to_display_time(instant), "2024-06-01 12:00:00");
    }

    #[test]
    fn naive_values_are_utc() {
        assert_eq!(parse_instant("2024-01-02T00:00:00").unwrap(), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(parse_instant("2024-01-02 08:15:00").unwrap(), utc(2024, 1, 2, 8, 15, 0));
        assert_eq!(parse_instant("2024-01-02T08:15").unwrap(), utc(2024, 1, 2, 8, 15, 0));
        assert_eq!(parse_instant("2024-01-02").unwrap(), utc(2024, 1, 2, 0, 0, 0));
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        assert_eq!(parse_instant("2024-01-02T00:00:00Z").unwrap(), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(
            parse_instant("2024-01-01T19:00:00-05:00").unwrap(),
            utc(2024, 1, 2, 0, 0, 0)
        );
        assert_eq!(
            parse_instant("2024-01-01 19:00:00-05:00").unwrap(),
            utc(2024, 1, 2, 0, 0, 0)
        );
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let parsed = parse_instant("2024-01-02T00:00:00.250").unwrap();
        assert_eq!(parsed, utc(2024, 1, 2, 0, 0, 0) + chrono::Duration::milliseconds(250));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_instant("notadate").is_err());
        assert!(parse_instant("").is_err());
        assert!(parse_instant("2024-13-01").is_err());
        assert!(parse_instant("2024-01-01T25:00:00").is_err());
    }

    #[test]
    fn api_time_is_rfc3339_millis() {
        assert_eq!(to_api_time(utc(2024, 6, 1, 17, 0, 0)), "2024-06-01T17:00:00.000Z");
    }
}
