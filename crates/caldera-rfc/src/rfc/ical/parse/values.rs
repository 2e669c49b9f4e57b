//! Value parsers for iCalendar data types (RFC 5545 §3.3).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{Date, DateTime, DateTimeForm, Duration, Period, UtcOffset};

/// Parses a fixed-width run of ASCII digits.
fn digits<T: std::str::FromStr>(s: &str, range: std::ops::Range<usize>) -> Option<T> {
    let part = s.get(range)?;
    if part.bytes().all(|b| b.is_ascii_digit()) {
        part.parse().ok()
    } else {
        None
    }
}

/// Parses a DATE value (`YYYYMMDD`).
///
/// ## Errors
/// Returns an error if the string is not eight digits or names a day that
/// does not exist.
pub fn parse_date(s: &str, line: usize, col: usize) -> ParseResult<Date> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidDate, line, col).with_context(format!("'{s}'"))
    };
    if s.len() != 8 {
        return Err(err());
    }
    let date = Date::new(
        digits(s, 0..4).ok_or_else(err)?,
        digits(s, 4..6).ok_or_else(err)?,
        digits(s, 6..8).ok_or_else(err)?,
    );
    date.naive().ok_or_else(err)?;
    Ok(date)
}

/// Parses a DATE-TIME value (`YYYYMMDDTHHMMSS[Z]`).
///
/// A trailing `Z` yields a UTC value and ignores `tzid`. Otherwise the
/// value is zoned when `tzid` is given and floating when it is not.
///
/// ## Errors
/// Returns an error if the string is malformed or out of range.
pub fn parse_datetime(s: &str, tzid: Option<&str>, line: usize, col: usize) -> ParseResult<DateTime> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidDateTime, line, col)
            .with_context(format!("'{s}'"))
    };

    let (body, utc) = match s.strip_suffix(['Z', 'z']) {
        Some(body) => (body, true),
        None => (s, false),
    };
    if body.len() != 15 || !matches!(body.as_bytes().get(8), Some(b'T' | b't')) {
        return Err(err());
    }

    let date = parse_date(&body[..8], line, col).map_err(|_e| err())?;
    let hour: u8 = digits(body, 9..11).ok_or_else(err)?;
    let minute: u8 = digits(body, 11..13).ok_or_else(err)?;
    let second: u8 = digits(body, 13..15).ok_or_else(err)?;
    if hour > 23 || minute > 59 || second > 60 {
        return Err(err());
    }

    let form = match (utc, tzid) {
        (true, _) => DateTimeForm::Utc,
        (false, Some(tzid)) => DateTimeForm::Zoned {
            tzid: tzid.to_string(),
        },
        (false, None) => DateTimeForm::Floating,
    };

    Ok(DateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        hour,
        minute,
        second,
        form,
    })
}

/// Parses a DURATION value (`[+-]P[nW]` or `[+-]P[nD][T[nH][nM][nS]]`).
///
/// ## Errors
/// Returns an error if the designators are out of order, a number is
/// missing, or no component is present.
pub fn parse_duration(s: &str, line: usize, col: usize) -> ParseResult<Duration> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidDuration, line, col)
            .with_context(format!("'{s}'"))
    };

    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = rest.strip_prefix(['P', 'p']).ok_or_else(err)?;

    let mut duration = Duration {
        negative,
        ..Duration::zero()
    };
    let mut in_time = false;
    let mut seen_any = false;
    // Designators must appear in this order; `rank` tracks the last one.
    let mut rank = 0_u8;
    let mut number = String::new();

    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let upper = c.to_ascii_uppercase();
        if upper == 'T' {
            if in_time || !number.is_empty() {
                return Err(err());
            }
            in_time = true;
            continue;
        }

        let value: u32 = number.parse().map_err(|_e| err())?;
        number.clear();
        let (slot, next_rank) = match (upper, in_time) {
            ('W', false) => (&mut duration.weeks, 1),
            ('D', false) => (&mut duration.days, 2),
            ('H', true) => (&mut duration.hours, 3),
            ('M', true) => (&mut duration.minutes, 4),
            ('S', true) => (&mut duration.seconds, 5),
            _ => return Err(err()),
        };
        if next_rank <= rank {
            return Err(err());
        }
        rank = next_rank;
        *slot = value;
        seen_any = true;
    }

    if !number.is_empty() || !seen_any || (in_time && rank < 3) {
        return Err(err());
    }
    Ok(duration)
}

/// Parses a PERIOD value (`start/end` or `start/duration`).
///
/// ## Errors
/// Returns an error if there is no `/` or either half is invalid.
pub fn parse_period(s: &str, tzid: Option<&str>, line: usize, col: usize) -> ParseResult<Period> {
    let Some((start, tail)) = s.split_once('/') else {
        return Err(
            ParseError::new(ParseErrorKind::InvalidPeriod, line, col).with_context(format!("'{s}'"))
        );
    };
    let start = parse_datetime(start, tzid, line, col)?;

    if tail.starts_with(['P', 'p', '+', '-']) {
        let duration = parse_duration(tail, line, col)?;
        Ok(Period::Duration { start, duration })
    } else {
        let end = parse_datetime(tail, tzid, line, col)?;
        Ok(Period::Explicit { start, end })
    }
}

/// Parses a UTC-OFFSET value (`+HHMM` or `+HHMMSS`).
///
/// ## Errors
/// Returns an error if the sign is missing, the length is wrong, or the
/// components are out of range. `-0000` is rejected.
pub fn parse_utc_offset(s: &str, line: usize, col: usize) -> ParseResult<UtcOffset> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidUtcOffset, line, col)
            .with_context(format!("'{s}'"))
    };

    let sign = match s.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(err()),
    };
    if s.len() != 5 && s.len() != 7 {
        return Err(err());
    }
    let hours: i32 = digits(s, 1..3).ok_or_else(err)?;
    let minutes: i32 = digits(s, 3..5).ok_or_else(err)?;
    let seconds: i32 = if s.len() == 7 {
        digits(s, 5..7).ok_or_else(err)?
    } else {
        0
    };
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(err());
    }

    let total = hours * 3600 + minutes * 60 + seconds;
    if sign < 0 && total == 0 {
        return Err(err());
    }
    Ok(UtcOffset::from_seconds(sign * total))
}

/// Parses an INTEGER value.
///
/// ## Errors
/// Returns an error if the value is not a signed 32-bit integer.
pub fn parse_integer(s: &str, line: usize, col: usize) -> ParseResult<i32> {
    s.trim().parse().map_err(|_e| {
        ParseError::new(ParseErrorKind::InvalidValue, line, col)
            .with_context(format!("expected integer, got '{s}'"))
    })
}

/// Parses a BOOLEAN value (`TRUE` or `FALSE`, case-insensitive).
///
/// ## Errors
/// Returns an error for any other text.
pub fn parse_boolean(s: &str, line: usize, col: usize) -> ParseResult<bool> {
    if s.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(ParseError::new(ParseErrorKind::InvalidValue, line, col)
            .with_context(format!("expected boolean, got '{s}'")))
    }
}

/// Unescapes a TEXT value (RFC 5545 §3.3.11).
///
/// Unknown escapes keep the escaped character.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits a multi-valued property on unescaped commas.
#[must_use]
pub fn split_list(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => escaped = false,
        }
    }
    parts.push(&s[start..]);
    parts
}
