//! Timezone resolution for one calendar object.
//!
//! Uses ICU4X for Windows timezone ID to IANA mapping and timezone canonicalization.

use std::cell::RefCell;
use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;

use super::error::{ExpandError, ExpandResult};
use super::vtimezone::VTimezone;
use crate::rfc::ical::object::{CalendarObject, Moment};

/// A frame in which wall-clock values are read.
#[derive(Debug, Clone, Copy)]
pub enum Zone<'a> {
    Iana(Tz),
    Defined(&'a VTimezone),
}

impl Zone<'_> {
    /// Resolves a wall-clock time to an instant.
    ///
    /// A repeated time takes its first occurrence; a skipped time is read
    /// with the offset in effect before the shift.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Defined(vtimezone) => vtimezone.to_utc(local),
            Self::Iana(tz) => match tz.from_local_datetime(&local) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(first, second) => {
                    first.with_timezone(&Utc).min(second.with_timezone(&Utc))
                }
                LocalResult::None => {
                    let before = tz
                        .offset_from_utc_datetime(&(local - TimeDelta::days(1)))
                        .fix();
                    let utc = local - TimeDelta::seconds(i64::from(before.local_minus_utc()));
                    DateTime::from_naive_utc_and_offset(utc, Utc)
                }
            },
        }
    }

    /// Wall-clock time at an instant.
    #[must_use]
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Defined(vtimezone) => vtimezone.to_local(utc),
            Self::Iana(tz) => utc.with_timezone(tz).naive_local(),
        }
    }
}

/// Resolves the TZIDs used by one object.
///
/// VTIMEZONE definitions carried by the object take precedence over the
/// IANA database. Floating and date values are read in the reference zone.
pub struct TimeZoneResolver {
    vtimezones: HashMap<String, VTimezone>,
    /// IANA lookups by TZID as written; `None` for unknown zones.
    iana: RefCell<HashMap<String, Option<Tz>>>,
    reference: Tz,
}

impl TimeZoneResolver {
    /// ## Summary
    /// Builds a resolver from the object's VTIMEZONE components.
    ///
    /// ## Side Effects
    /// A VTIMEZONE that cannot be read is skipped with a warning; its
    /// TZID then resolves through the IANA database.
    #[must_use]
    pub fn for_object(object: &CalendarObject, reference: Tz) -> Self {
        let mut vtimezones = HashMap::new();
        for component in &object.timezones {
            match VTimezone::parse(component) {
                Ok(vtimezone) => {
                    vtimezones.insert(vtimezone.tzid.clone(), vtimezone);
                }
                Err(error) => {
                    tracing::warn!(uid = %object.uid, %error, "Ignoring unreadable VTIMEZONE");
                }
            }
        }
        Self {
            vtimezones,
            iana: RefCell::default(),
            reference,
        }
    }

    /// The zone floating and date values are read in.
    #[must_use]
    pub fn reference(&self) -> Zone<'_> {
        Zone::Iana(self.reference)
    }

    /// ## Summary
    /// Resolves a TZID.
    ///
    /// Each TZID is normalized and looked up once per resolver.
    ///
    /// ## Errors
    /// Returns `ExpandError::UnknownTimezone` if the TZID matches neither a
    /// VTIMEZONE nor a known zone.
    pub fn zone(&self, tzid: &str) -> ExpandResult<Zone<'_>> {
        if let Some(vtimezone) = self.vtimezones.get(tzid) {
            return Ok(Zone::Defined(vtimezone));
        }
        let cached = self.iana.borrow().get(tzid).copied();
        let resolved = cached.unwrap_or_else(|| {
            let resolved = Tz::from_str(&normalize_tzid(tzid)).ok();
            self.iana.borrow_mut().insert(tzid.to_owned(), resolved);
            resolved
        });
        resolved
            .map(Zone::Iana)
            .ok_or_else(|| ExpandError::UnknownTimezone {
                tzid: tzid.to_string(),
            })
    }

    /// ## Summary
    /// The zone a value's wall-clock time lives in.
    ///
    /// ## Errors
    /// Returns `ExpandError::UnknownTimezone` for an unresolvable TZID.
    pub fn frame(&self, moment: &Moment) -> ExpandResult<Zone<'_>> {
        match moment {
            Moment::Date(_) | Moment::Floating(_) => Ok(self.reference()),
            Moment::Utc(_) => Ok(Zone::Iana(Tz::UTC)),
            Moment::Zoned { tzid, .. } => self.zone(tzid),
        }
    }

    /// ## Summary
    /// The instant a value denotes; dates start at midnight.
    ///
    /// ## Errors
    /// Returns `ExpandError::UnknownTimezone` for an unresolvable TZID.
    pub fn instant(&self, moment: &Moment) -> ExpandResult<DateTime<Utc>> {
        Ok(self.frame(moment)?.to_utc(moment.local()))
    }
}

/// Normalizes common CalDAV/iCalendar timezone identifiers to IANA names.
///
/// Strips `/mozilla.org/`-style prefixes, maps Windows zone names and
/// canonicalizes IANA aliases.
fn normalize_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .or_else(|| tzid.strip_prefix('/'))
        .unwrap_or(tzid);

    let iana_parser = IanaParserExtended::new();

    if let Some(zone) = WindowsParser::new().parse(stripped, None)
        && let Some(entry) = iana_parser.iter().find(|entry| entry.time_zone == zone)
    {
        return entry.canonical.to_string();
    }

    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone != icu::time::TimeZone::UNKNOWN {
        return parsed.canonical.to_string();
    }

    stripped.to_string()
}
