//! ISO-8601 `date`/`dateTime` parsing to UTC instants
//!
//! The lexical space follows XML Schema: `YYYY-MM-DD` with an optional
//! timezone for `date`, and `YYYY-MM-DDThh:mm:ss(.fff)?` with an optional
//! timezone for `dateTime`. A missing timezone is read as UTC. Values are
//! carried as milliseconds since the Unix epoch.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-?\d{4,})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(\.\d+)?(Z|[+-]\d{2}:\d{2})?$",
    )
    .unwrap()
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})(Z|[+-]\d{2}:\d{2})?$").unwrap());

/// A UTC instant, stored as milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Milliseconds since 1970-01-01T00:00:00Z
    pub millis: i64,
}

impl Timestamp {
    /// Create a timestamp from epoch milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Parse an XSD `dateTime` lexical value
    pub fn parse_date_time(value: &str) -> Result<Self> {
        let caps = DATETIME_RE
            .captures(value.trim())
            .ok_or_else(|| Error::coercion(format!("'{}' is not a valid dateTime", value)))?;

        let year: i64 = caps[1].parse().map_err(|_| {
            Error::coercion(format!("'{}' has an out-of-range year", value))
        })?;
        let month: u32 = caps[2].parse().unwrap();
        let day: u32 = caps[3].parse().unwrap();
        let hour: i64 = caps[4].parse().unwrap();
        let minute: i64 = caps[5].parse().unwrap();
        let second: i64 = caps[6].parse().unwrap();
        check_civil(value, year, month, day)?;
        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::coercion(format!(
                "'{}' has an out-of-range time component",
                value
            )));
        }

        let frac_millis = match caps.get(7) {
            Some(frac) => parse_fraction_millis(frac.as_str()),
            None => 0,
        };
        let tz_minutes = parse_timezone(caps.get(8).map(|m| m.as_str()))?;

        let days = days_from_civil(year, month, day);
        let millis = days * 86_400_000
            + hour * 3_600_000
            + minute * 60_000
            + second * 1_000
            + frac_millis
            - tz_minutes * 60_000;
        Ok(Self { millis })
    }

    /// Parse an XSD `date` lexical value (midnight UTC of that day)
    pub fn parse_date(value: &str) -> Result<Self> {
        let caps = DATE_RE
            .captures(value.trim())
            .ok_or_else(|| Error::coercion(format!("'{}' is not a valid date", value)))?;

        let year: i64 = caps[1].parse().map_err(|_| {
            Error::coercion(format!("'{}' has an out-of-range year", value))
        })?;
        let month: u32 = caps[2].parse().unwrap();
        let day: u32 = caps[3].parse().unwrap();
        check_civil(value, year, month, day)?;
        let tz_minutes = parse_timezone(caps.get(4).map(|m| m.as_str()))?;

        let millis = days_from_civil(year, month, day) * 86_400_000 - tz_minutes * 60_000;
        Ok(Self { millis })
    }
}

impl fmt::Display for Timestamp {
    /// ISO-8601 rendering in UTC, e.g. `2024-01-15T10:30:00Z`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.millis.div_euclid(86_400_000);
        let mut rem = self.millis.rem_euclid(86_400_000);
        let (year, month, day) = civil_from_days(days);
        let hour = rem / 3_600_000;
        rem %= 3_600_000;
        let minute = rem / 60_000;
        rem %= 60_000;
        let second = rem / 1_000;
        let millis = rem % 1_000;
        if millis == 0 {
            write!(
                f,
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                year, month, day, hour, minute, second
            )
        } else {
            write!(
                f,
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
                year, month, day, hour, minute, second, millis
            )
        }
    }
}

fn check_civil(value: &str, year: i64, month: u32, day: u32) -> Result<()> {
    if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month) {
        return Err(Error::coercion(format!(
            "'{}' is not a valid calendar date",
            value
        )));
    }
    Ok(())
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Fractional seconds to whole milliseconds, truncating extra digits
fn parse_fraction_millis(frac: &str) -> i64 {
    let digits = &frac[1..]; // skip the dot
    let mut millis = 0i64;
    for (i, c) in digits.chars().take(3).enumerate() {
        millis += (c as i64 - '0' as i64) * 10i64.pow(2 - i as u32);
    }
    millis
}

/// Timezone designator to an offset in minutes east of UTC
fn parse_timezone(tz: Option<&str>) -> Result<i64> {
    match tz {
        None | Some("Z") => Ok(0),
        Some(s) => {
            let sign = if s.starts_with('-') { -1 } else { 1 };
            let hours: i64 = s[1..3].parse().unwrap();
            let minutes: i64 = s[4..6].parse().unwrap();
            if hours > 14 || minutes > 59 {
                return Err(Error::coercion(format!("'{}' is not a valid timezone", s)));
            }
            Ok(sign * (hours * 60 + minutes))
        }
    }
}

/// Days from 1970-01-01 for a proleptic-Gregorian civil date
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of `days_from_civil`
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if month <= 2 { y + 1 } else { y }, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        let ts = Timestamp::parse_date_time("1970-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.millis, 0);
    }

    #[test]
    fn test_datetime_utc() {
        let ts = Timestamp::parse_date_time("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(ts.millis, 1_705_314_600_000);
    }

    #[test]
    fn test_datetime_no_timezone_is_utc() {
        let with_z = Timestamp::parse_date_time("2024-01-15T10:30:00Z").unwrap();
        let without = Timestamp::parse_date_time("2024-01-15T10:30:00").unwrap();
        assert_eq!(with_z, without);
    }

    #[test]
    fn test_datetime_offset() {
        // 10:30:00+05:30 is 05:00:00Z
        let offset = Timestamp::parse_date_time("2024-01-15T10:30:00+05:30").unwrap();
        let utc = Timestamp::parse_date_time("2024-01-15T05:00:00Z").unwrap();
        assert_eq!(offset, utc);
    }

    #[test]
    fn test_datetime_fraction() {
        let ts = Timestamp::parse_date_time("2024-01-15T10:30:00.25Z").unwrap();
        assert_eq!(ts.millis % 1000, 250);
    }

    #[test]
    fn test_date_midnight() {
        let date = Timestamp::parse_date("2024-01-15").unwrap();
        let midnight = Timestamp::parse_date_time("2024-01-15T00:00:00Z").unwrap();
        assert_eq!(date, midnight);
    }

    #[test]
    fn test_pre_epoch() {
        let ts = Timestamp::parse_date("1969-12-31").unwrap();
        assert_eq!(ts.millis, -86_400_000);
    }

    #[test]
    fn test_leap_day() {
        assert!(Timestamp::parse_date("2024-02-29").is_ok());
        assert!(Timestamp::parse_date("2023-02-29").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Timestamp::parse_date_time("not-a-date").is_err());
        assert!(Timestamp::parse_date_time("2024-13-01T00:00:00").is_err());
        assert!(Timestamp::parse_date_time("2024-01-01T24:00:01").is_err());
        assert!(Timestamp::parse_date("2024-00-10").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "2024-01-15T10:30:00Z",
            "1970-01-01T00:00:00Z",
            "1999-12-31T23:59:59.500Z",
        ] {
            let ts = Timestamp::parse_date_time(input).unwrap();
            assert_eq!(ts.to_string(), input);
        }
    }
}
