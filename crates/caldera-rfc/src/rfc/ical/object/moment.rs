//! Date and date-time values in the form they were declared.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::rfc::ical::core::{Date, DateTime, DateTimeForm, Property, Value};

/// A DTSTART/DTEND/RECURRENCE-ID/RDATE/EXDATE value as declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Moment {
    /// `VALUE=DATE`: a whole day.
    Date(NaiveDate),
    /// Wall-clock time without zone.
    Floating(NaiveDateTime),
    /// Absolute UTC time (`Z` suffix).
    Utc(NaiveDateTime),
    /// Wall-clock time in a named zone.
    Zoned { local: NaiveDateTime, tzid: String },
}

impl Moment {
    /// Reads a single date or date-time property value.
    #[must_use]
    pub fn from_property(prop: &Property) -> Option<Self> {
        match &prop.value {
            Value::Date(date) => Self::from_date(date),
            Value::DateTime(dt) => Self::from_datetime(dt),
            _ => None,
        }
    }

    /// Converts a parsed DATE value.
    #[must_use]
    pub fn from_date(date: &Date) -> Option<Self> {
        date.naive().map(Self::Date)
    }

    /// Converts a parsed DATE-TIME value.
    #[must_use]
    pub fn from_datetime(dt: &DateTime) -> Option<Self> {
        let local = dt.naive()?;
        Some(match &dt.form {
            DateTimeForm::Floating => Self::Floating(local),
            DateTimeForm::Utc => Self::Utc(local),
            DateTimeForm::Zoned { tzid } => Self::Zoned {
                local,
                tzid: tzid.clone(),
            },
        })
    }

    /// Wall-clock value; dates start at midnight.
    #[must_use]
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::Floating(local) | Self::Utc(local) | Self::Zoned { local, .. } => *local,
        }
    }

    #[must_use]
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the zone identifier of a zoned value.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    /// Whether two values share a wall-clock frame, so that their
    /// difference is a wall-clock difference.
    #[must_use]
    pub fn same_frame(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Date(_), Self::Date(_))
            | (Self::Floating(_), Self::Floating(_))
            | (Self::Utc(_), Self::Utc(_)) => true,
            (Self::Zoned { tzid: a, .. }, Self::Zoned { tzid: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Builds a value in the same form as `self` at another wall-clock time.
    #[must_use]
    pub fn with_local(&self, local: NaiveDateTime) -> Self {
        match self {
            Self::Date(_) => Self::Date(local.date()),
            Self::Floating(_) => Self::Floating(local),
            Self::Utc(_) => Self::Utc(local),
            Self::Zoned { tzid, .. } => Self::Zoned {
                local,
                tzid: tzid.clone(),
            },
        }
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
            Self::Floating(local) => write!(f, "{}", local.format("%Y%m%dT%H%M%S")),
            Self::Utc(local) => write!(f, "{}", local.format("%Y%m%dT%H%M%SZ")),
            Self::Zoned { local, tzid } => {
                write!(f, "{};TZID={tzid}", local.format("%Y%m%dT%H%M%S"))
            }
        }
    }
}
