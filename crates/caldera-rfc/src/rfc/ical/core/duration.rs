//! iCalendar DURATION value type (RFC 5545 §3.3.6).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Duration value (RFC 5545 §3.3.6).
///
/// Either week-based (`P2W`) or day/time-based (`P1DT2H30M`). Weeks and
/// days are nominal: they advance the wall clock, so a `P1D` duration
/// across a DST change is 23 or 25 hours long. Hours, minutes and
/// seconds are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Duration {
    pub negative: bool,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            negative: false,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    /// Creates a duration of whole days.
    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::zero()
        }
    }

    /// Creates a duration of whole hours.
    #[must_use]
    pub const fn hours(hours: u32) -> Self {
        Self {
            hours,
            ..Self::zero()
        }
    }

    const fn sign(&self) -> i64 {
        if self.negative { -1 } else { 1 }
    }

    /// Signed number of nominal days (weeks count as seven days).
    #[must_use]
    pub fn nominal_days(&self) -> i64 {
        self.sign() * (i64::from(self.weeks) * 7 + i64::from(self.days))
    }

    /// Signed number of exact seconds (hours, minutes and seconds only).
    #[must_use]
    pub fn exact_seconds(&self) -> i64 {
        self.sign()
            * (i64::from(self.hours) * 3600 + i64::from(self.minutes) * 60 + i64::from(self.seconds))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;

        if self.weeks > 0 {
            return write!(f, "{}W", self.weeks);
        }
        let has_time = self.hours > 0 || self.minutes > 0 || self.seconds > 0;
        if self.days > 0 || !has_time {
            write!(f, "{}D", self.days)?;
        }
        if has_time {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}
