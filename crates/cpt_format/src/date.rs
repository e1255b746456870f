//! CPT date and date-range tokens.
//!
//! A token without `/` is a single calendar day (`1990-03-01`, optionally
//! stamped `T00:00`). A token with `/` is a period: `1980-06/09` covers June
//! through September 1980 and carries its start, end and midpoint.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use time::{Date, Month, PrimitiveDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("empty date token")]
    Empty,

    #[error("'{token}' is not a calendar date")]
    Malformed { token: String },

    #[error("'{token}' is a bare year; single dates need a year, month and day")]
    BareYear { token: String },

    #[error("'{token}' is a bare year-month; single dates need a year, month and day")]
    BareYearMonth { token: String },

    #[error("'{token}' carries a time of day other than midnight")]
    NonMidnight { token: String },

    #[error("'{token}' is a month-only range; the range start must include a year")]
    MonthOnlyRange { token: String },

    #[error("'{token}' has a range end with more components than its start")]
    UnbalancedRange { token: String },

    #[error("'{token}' ends before it starts")]
    ReversedRange { token: String },

    #[error("'{token}' names a day outside the calendar")]
    OutOfRange { token: String },
}

/// One parsed date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    Instant(PrimitiveDateTime),
    Range {
        start: PrimitiveDateTime,
        midpoint: PrimitiveDateTime,
        end: PrimitiveDateTime,
    },
}

impl DateToken {
    pub fn parse(token: &str) -> Result<Self, DateError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DateError::Empty);
        }

        match token.split_once('/') {
            Some((left, right)) => parse_range(token, left, right),
            None => parse_instant(token).map(Self::Instant),
        }
    }

    /// Builds a period; the midpoint is `start + (end - start) / 2`.
    #[must_use]
    pub fn range(start: PrimitiveDateTime, end: PrimitiveDateTime) -> Self {
        Self::Range {
            start,
            midpoint: start + (end - start) / 2_i32,
            end,
        }
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    #[must_use]
    pub fn start(&self) -> PrimitiveDateTime {
        match *self {
            Self::Instant(instant) => instant,
            Self::Range { start, .. } => start,
        }
    }

    /// The representative instant: the instant itself, or a period's midpoint.
    #[must_use]
    pub fn midpoint(&self) -> PrimitiveDateTime {
        match *self {
            Self::Instant(instant) => instant,
            Self::Range { midpoint, .. } => midpoint,
        }
    }

    #[must_use]
    pub fn end(&self) -> PrimitiveDateTime {
        match *self {
            Self::Instant(instant) => instant,
            Self::Range { end, .. } => end,
        }
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Instant(instant) => f.write_str(&format_instant(instant)),
            Self::Range { start, end, .. } => f.write_str(&format_range(start, end)),
        }
    }
}

impl FromStr for DateToken {
    type Err = DateError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::parse(token)
    }
}

/// `YYYY-MM-DD` at midnight, `YYYY-MM-DDTHH:MM` otherwise.
#[must_use]
pub fn format_instant(instant: PrimitiveDateTime) -> String {
    if instant.time() == time::Time::MIDNIGHT {
        format_day(instant.date())
    } else {
        format_stamp(instant)
    }
}

/// Always `YYYY-MM-DDTHH:MM`; used for forecast start (`S`) tags.
#[must_use]
pub fn format_stamp(instant: PrimitiveDateTime) -> String {
    format!(
        "{}T{:02}:{:02}",
        format_day(instant.date()),
        instant.hour(),
        instant.minute()
    )
}

#[must_use]
pub fn format_range(start: PrimitiveDateTime, end: PrimitiveDateTime) -> String {
    format!("{}/{}", format_day(start.date()), format_day(end.date()))
}

fn format_day(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn date_part_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^\d{1,4}(?:-\d{1,2}){0,2}$").expect("date regex must compile")
    })
}

fn time_part_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^(\d{2}):(\d{2})(?::(\d{2}))?$").expect("time regex must compile")
    })
}

fn split_time(token: &str) -> (&str, Option<&str>) {
    match token.find(['T', ' ']) {
        Some(index) => (&token[..index], Some(&token[index + 1..])),
        None => (token, None),
    }
}

/// Splits `Y[-M[-D]]` into its numeric components; also reports whether the
/// first component is a four-digit year.
fn components(date_part: &str, token: &str) -> Result<(Vec<u32>, bool), DateError> {
    if !date_part_regex().is_match(date_part) {
        return Err(DateError::Malformed {
            token: token.to_string(),
        });
    }

    let mut has_year = false;
    let mut parts = Vec::with_capacity(3);
    for (index, piece) in date_part.split('-').enumerate() {
        if index == 0 {
            has_year = piece.len() == 4;
        }
        let value = piece.parse::<u32>().map_err(|_| DateError::Malformed {
            token: token.to_string(),
        })?;
        parts.push(value);
    }

    Ok((parts, has_year))
}

fn parse_instant(token: &str) -> Result<PrimitiveDateTime, DateError> {
    let (date_part, time_part) = split_time(token);
    let (parts, has_year) = components(date_part, token)?;
    if !has_year {
        return Err(DateError::Malformed {
            token: token.to_string(),
        });
    }

    match parts.len() {
        1 => {
            return Err(DateError::BareYear {
                token: token.to_string(),
            })
        }
        2 => {
            return Err(DateError::BareYearMonth {
                token: token.to_string(),
            })
        }
        _ => {}
    }

    if let Some(time_part) = time_part {
        let captures = time_part_regex()
            .captures(time_part)
            .ok_or_else(|| DateError::Malformed {
                token: token.to_string(),
            })?;
        let is_midnight = captures
            .iter()
            .skip(1)
            .flatten()
            .all(|field| field.as_str().chars().all(|c| c == '0'));
        if !is_midnight {
            return Err(DateError::NonMidnight {
                token: token.to_string(),
            });
        }
    }

    calendar_date(parts[0], parts[1], parts[2], token).map(Date::midnight)
}

fn parse_range(token: &str, left: &str, right: &str) -> Result<DateToken, DateError> {
    if right.contains('/') {
        return Err(DateError::Malformed {
            token: token.to_string(),
        });
    }

    // Ranges are day-granular; any time-of-day suffix is dropped.
    let (left, _) = split_time(left.trim());
    let (right, _) = split_time(right.trim());

    let (start_parts, left_has_year) = components(left, token)?;
    let (end_parts, right_has_year) = components(right, token)?;

    if !left_has_year {
        return Err(DateError::MonthOnlyRange {
            token: token.to_string(),
        });
    }
    if end_parts.len() > start_parts.len() {
        return Err(DateError::UnbalancedRange {
            token: token.to_string(),
        });
    }
    if end_parts.len() == start_parts.len() && !right_has_year {
        return Err(DateError::Malformed {
            token: token.to_string(),
        });
    }

    let borrowed = start_parts.len() - end_parts.len();
    let mut end_full = start_parts[..borrowed].to_vec();
    end_full.extend_from_slice(&end_parts);

    let start = period_start(&start_parts, token)?;
    let end = period_end(&end_full, token)?;
    if end < start {
        return Err(DateError::ReversedRange {
            token: token.to_string(),
        });
    }

    Ok(DateToken::range(start, end))
}

fn period_start(parts: &[u32], token: &str) -> Result<PrimitiveDateTime, DateError> {
    let month = parts.get(1).copied().unwrap_or(1);
    let day = parts.get(2).copied().unwrap_or(1);
    calendar_date(parts[0], month, day, token).map(Date::midnight)
}

fn period_end(parts: &[u32], token: &str) -> Result<PrimitiveDateTime, DateError> {
    let month = parts.get(1).copied().unwrap_or(12);
    let day = match parts.get(2) {
        Some(day) => *day,
        None => {
            let month = to_month(month, token)?;
            u32::from(time::util::days_in_year_month(year(parts[0]), month))
        }
    };
    calendar_date(parts[0], month, day, token).map(Date::midnight)
}

fn year(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_month(value: u32, token: &str) -> Result<Month, DateError> {
    u8::try_from(value)
        .ok()
        .and_then(|value| Month::try_from(value).ok())
        .ok_or_else(|| DateError::OutOfRange {
            token: token.to_string(),
        })
}

fn calendar_date(year_value: u32, month: u32, day: u32, token: &str) -> Result<Date, DateError> {
    let month = to_month(month, token)?;
    let day = u8::try_from(day).map_err(|_| DateError::OutOfRange {
        token: token.to_string(),
    })?;
    Date::from_calendar_date(year(year_value), month, day).map_err(|_| DateError::OutOfRange {
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{format_instant, format_stamp, DateError, DateToken};
    use time::macros::datetime;

    #[test]
    fn day_range_round_trips_and_centres_midpoint() {
        let token = DateToken::parse("1990-03-01/1990-05-31").expect("valid range");
        assert_eq!(token.to_string(), "1990-03-01/1990-05-31");
        assert_eq!(token.start(), datetime!(1990-03-01 0:00));
        assert_eq!(token.end(), datetime!(1990-05-31 0:00));
        assert_eq!(
            token.midpoint(),
            token.start() + (token.end() - token.start()) / 2_i32
        );
        assert_eq!(token.midpoint(), datetime!(1990-04-15 12:00));
    }

    #[test]
    fn month_range_borrows_leading_year() {
        let token = DateToken::parse("1980-06/09").expect("seasonal range");
        assert_eq!(token.start(), datetime!(1980-06-01 0:00));
        assert_eq!(token.end(), datetime!(1980-09-30 0:00));
        assert_eq!(token.midpoint(), datetime!(1980-07-31 12:00));
    }

    #[test]
    fn month_range_across_year_boundary_ends_on_last_day() {
        let token = DateToken::parse("2015-12/2016-02").expect("winter range");
        assert_eq!(token.start(), datetime!(2015-12-01 0:00));
        assert_eq!(token.end(), datetime!(2016-02-29 0:00));
        assert_eq!(token.to_string(), "2015-12-01/2016-02-29");
    }

    #[test]
    fn day_range_borrows_year_for_month_day_end() {
        let token = DateToken::parse("1990-03-01/05-31").expect("short range");
        assert_eq!(token.end(), datetime!(1990-05-31 0:00));
    }

    #[test]
    fn year_range_spans_whole_years() {
        let token = DateToken::parse("1990/1991").expect("year range");
        assert_eq!(token.start(), datetime!(1990-01-01 0:00));
        assert_eq!(token.end(), datetime!(1991-12-31 0:00));
    }

    #[test]
    fn range_drops_time_of_day_suffixes() {
        let token = DateToken::parse("1990-03-01T00:00/1990-05-31T00:00").expect("stamped range");
        assert_eq!(token.to_string(), "1990-03-01/1990-05-31");
    }

    #[test]
    fn single_day_parses_with_and_without_midnight_stamp() {
        let plain = DateToken::parse("2021-05-01").expect("plain day");
        let stamped = DateToken::parse("2021-05-01T00:00").expect("stamped day");
        assert_eq!(plain, stamped);
        assert_eq!(plain, DateToken::Instant(datetime!(2021-05-01 0:00)));
        assert_eq!(plain.to_string(), "2021-05-01");
    }

    #[test]
    fn unpadded_components_are_accepted() {
        let token = DateToken::parse("1990-3-1/1990-5-31").expect("unpadded range");
        assert_eq!(token.to_string(), "1990-03-01/1990-05-31");
    }

    #[test]
    fn strict_single_dates_reject_ambiguous_forms() {
        assert!(matches!(
            DateToken::parse("1990"),
            Err(DateError::BareYear { .. })
        ));
        assert!(matches!(
            DateToken::parse("1990-06"),
            Err(DateError::BareYearMonth { .. })
        ));
        assert!(matches!(
            DateToken::parse("1990-06-01T12:30"),
            Err(DateError::NonMidnight { .. })
        ));
        assert!(matches!(
            DateToken::parse("06/09"),
            Err(DateError::MonthOnlyRange { .. })
        ));
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(matches!(
            DateToken::parse("1990-06/1990-09-30"),
            Err(DateError::UnbalancedRange { .. })
        ));
        assert!(matches!(
            DateToken::parse("1990-09-01/1990-06-01"),
            Err(DateError::ReversedRange { .. })
        ));
        assert!(matches!(
            DateToken::parse("1990-02-30"),
            Err(DateError::OutOfRange { .. })
        ));
        assert!(matches!(
            DateToken::parse("below"),
            Err(DateError::Malformed { .. })
        ));
        assert!(matches!(DateToken::parse("  "), Err(DateError::Empty)));
    }

    #[test]
    fn instants_render_stamp_only_off_midnight() {
        assert_eq!(format_instant(datetime!(1980-07-31 12:00)), "1980-07-31T12:00");
        assert_eq!(format_instant(datetime!(1980-07-31 0:00)), "1980-07-31");
        assert_eq!(format_stamp(datetime!(2021-05-01 0:00)), "2021-05-01T00:00");
    }
}
