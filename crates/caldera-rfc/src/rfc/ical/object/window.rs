//! Half-open UTC query windows.

use caldera_core::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` range of absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// ## Summary
    /// Creates a window.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidInput` when `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidInput(format!(
                "time window starts after it ends: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// ## Summary
    /// Creates a window from `YYYYMMDDTHHMMSSZ` bounds. A missing bound
    /// extends the window to the limit of representable calendar dates.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidInput` for a malformed bound or a start
    /// after the end.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> CoreResult<Self> {
        let start = start.map_or_else(|| Ok(Self::earliest()), parse_utc)?;
        let end = end.map_or_else(|| Ok(Self::latest()), parse_utc)?;
        Self::new(start, end)
    }

    /// The window covering every date an iCalendar value can express.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            start: Self::earliest(),
            end: Self::latest(),
        }
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    fn earliest() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map_or(DateTime::<Utc>::MIN_UTC, |naive| Utc.from_utc_datetime(&naive))
    }

    fn latest() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(9999, 12, 31)
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map_or(DateTime::<Utc>::MAX_UTC, |naive| Utc.from_utc_datetime(&naive))
    }
}

fn parse_utc(value: &str) -> CoreResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| CoreError::InvalidInput(format!("invalid UTC time '{value}': {e}")))
}
