//! DATE, PERIOD and the typed property value (RFC 5545 §3.3).

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{DateTime, Duration, UtcOffset};

/// Calendar date without a time, as in `VALUE=DATE:20060103`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    #[must_use]
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// `None` outside years `0..=9999`.
    #[must_use]
    pub fn from_naive(date: NaiveDate) -> Option<Self> {
        let year = u16::try_from(date.year()).ok().filter(|y| *y <= 9999)?;
        Some(Self {
            year,
            month: u8::try_from(date.month()).ok()?,
            day: u8::try_from(date.day()).ok()?,
        })
    }

    /// `None` for an impossible date such as February 30.
    #[must_use]
    pub fn naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

/// PERIOD value, as found in `RDATE;VALUE=PERIOD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Explicit { start: DateTime, end: DateTime },
    Duration { start: DateTime, duration: Duration },
}

impl Period {
    #[must_use]
    pub fn start(&self) -> &DateTime {
        match self {
            Self::Explicit { start, .. } | Self::Duration { start, .. } => start,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit { start, end } => write!(f, "{start}/{end}"),
            Self::Duration { start, duration } => write!(f, "{start}/{duration}"),
        }
    }
}

/// A property value after typing by the parser.
///
/// The escaped source text lives next to it on [`super::Property`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Date(Date),
    DateList(Vec<Date>),
    DateTime(DateTime),
    DateTimeList(Vec<DateTime>),
    Duration(Duration),
    Integer(i32),
    Period(Period),
    PeriodList(Vec<Period>),
    /// RECUR value, kept as written. It is interpreted during expansion
    /// so a malformed rule fails that object's expansion, not its parse.
    Recur(String),
    /// Already unescaped.
    Text(String),
    Uri(String),
    UtcOffset(UtcOffset),
    /// Value types nothing here interprets, kept verbatim.
    Unknown(String),
}

macro_rules! single_value_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(&self) -> Option<&$ty> {
            if let Self::$variant(inner) = self {
                Some(inner)
            } else {
                None
            }
        }
    };
}

impl Value {
    single_value_accessor!(as_text, Text, str);
    single_value_accessor!(as_datetime, DateTime, DateTime);
    single_value_accessor!(as_date, Date, Date);
    single_value_accessor!(as_duration, Duration, Duration);
}
