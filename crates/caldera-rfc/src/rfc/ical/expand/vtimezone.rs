//! VTIMEZONE definitions (RFC 5545 §3.6.5).
//!
//! Each STANDARD/DAYLIGHT observance is expanded into its onsets once, up
//! to `TRANSITION_HORIZON_YEAR`; offsets past the last onset stay at the
//! last observance's offset.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};

use super::rule::{rule_set, wall_clock};
use crate::rfc::ical::core::{Component, ComponentKind, Period, UtcOffset, Value, names};
use crate::rfc::ical::object::Moment;

const TRANSITION_HORIZON_YEAR: i32 = 2100;
const MAX_ONSETS_PER_OBSERVANCE: usize = 1000;

/// Error while reading a VTIMEZONE component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VTimezoneError {
    #[error("missing TZID property")]
    MissingTzid,

    #[error("VTIMEZONE {0} has no STANDARD or DAYLIGHT component")]
    NoObservances(String),

    #[error("missing {0} in {1} component")]
    MissingProperty(&'static str, ComponentKind),

    #[error("invalid observance rule: {0}")]
    InvalidRule(String),
}

/// A change of offset at an absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    at: NaiveDateTime,
    offset_from: UtcOffset,
    offset_to: UtcOffset,
}

/// A zone defined inline by a VTIMEZONE component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTimezone {
    pub tzid: String,
    /// Onsets of every observance, ascending by UTC instant.
    transitions: Vec<Transition>,
}

impl VTimezone {
    /// ## Summary
    /// Reads a VTIMEZONE component and expands its observances.
    ///
    /// ## Errors
    /// Returns an error if TZID, an observance's DTSTART or offsets are
    /// missing, or an observance RRULE is malformed.
    pub fn parse(component: &Component) -> Result<Self, VTimezoneError> {
        let tzid = component
            .get_property(names::TZID)
            .and_then(|p| p.as_text())
            .ok_or(VTimezoneError::MissingTzid)?
            .to_string();

        let mut transitions = Vec::new();
        for child in &component.children {
            if let Some(kind @ (ComponentKind::Standard | ComponentKind::Daylight)) = child.kind {
                transitions.extend(observance_onsets(child, kind)?);
            }
        }
        if transitions.is_empty() {
            return Err(VTimezoneError::NoObservances(tzid));
        }
        transitions.sort_by_key(|t| t.at);
        transitions.dedup_by_key(|t| t.at);

        Ok(Self { tzid, transitions })
    }

    /// Offset in effect at an absolute instant.
    #[must_use]
    pub fn offset_at(&self, utc: NaiveDateTime) -> UtcOffset {
        let after = self.transitions.partition_point(|t| t.at <= utc);
        match after.checked_sub(1).and_then(|i| self.transitions.get(i)) {
            Some(transition) => transition.offset_to,
            None => self
                .transitions
                .first()
                .map_or(UtcOffset::UTC, |t| t.offset_from),
        }
    }

    /// Resolves a wall-clock time to an instant.
    ///
    /// A time repeated by a backward shift resolves to its first
    /// occurrence. A time skipped by a forward shift is read with the
    /// offset in effect before the shift.
    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let mut offsets: Vec<UtcOffset> = self
            .transitions
            .iter()
            .flat_map(|t| [t.offset_from, t.offset_to])
            .collect();
        offsets.sort_by_key(|o| o.as_seconds());
        offsets.dedup();

        let resolved = offsets
            .into_iter()
            .map(|offset| (offset, local - offset.as_delta()))
            .filter(|(offset, utc)| self.offset_at(*utc) == *offset)
            .map(|(_, utc)| utc)
            .min();

        let utc = resolved.unwrap_or_else(|| {
            let before = self.offset_at(local - TimeDelta::days(1));
            local - before.as_delta()
        });
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }

    /// Wall-clock time at an instant.
    #[must_use]
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        let naive = utc.naive_utc();
        naive + self.offset_at(naive).as_delta()
    }
}

fn offset_property(
    component: &Component,
    name: &'static str,
    kind: ComponentKind,
) -> Result<UtcOffset, VTimezoneError> {
    match component.get_property(name).map(|p| &p.value) {
        Some(Value::UtcOffset(offset)) => Ok(*offset),
        _ => Err(VTimezoneError::MissingProperty(name, kind)),
    }
}

/// Every onset of one observance, as UTC transitions.
fn observance_onsets(
    component: &Component,
    kind: ComponentKind,
) -> Result<Vec<Transition>, VTimezoneError> {
    let dtstart = component
        .get_property(names::DTSTART)
        .and_then(Moment::from_property)
        .ok_or(VTimezoneError::MissingProperty(names::DTSTART, kind))?
        .local();
    let offset_from = offset_property(component, names::TZOFFSETFROM, kind)?;
    let offset_to = offset_property(component, names::TZOFFSETTO, kind)?;

    // Onsets are written in the local time that was in effect before them.
    let mut onsets = vec![dtstart];

    for prop in component.get_properties(names::RDATE) {
        match &prop.value {
            Value::DateTime(dt) => onsets.extend(dt.naive()),
            Value::DateTimeList(list) => onsets.extend(list.iter().filter_map(|dt| dt.naive())),
            Value::PeriodList(periods) => {
                onsets.extend(periods.iter().filter_map(|p: &Period| p.start().naive()));
            }
            _ => {}
        }
    }

    if let Some(rule) = component.get_property(names::RRULE) {
        let set = rule_set(&rule.raw_value, dtstart, false, |utc| {
            utc.naive_utc() + offset_from.as_delta()
        })
        .map_err(VTimezoneError::InvalidRule)?;
        onsets.extend(
            wall_clock(&set)
                .take_while(|onset| onset.year() <= TRANSITION_HORIZON_YEAR)
                .take(MAX_ONSETS_PER_OBSERVANCE),
        );
    }

    Ok(onsets
        .into_iter()
        .map(|onset| Transition {
            at: onset - offset_from.as_delta(),
            offset_from,
            offset_to,
        })
        .collect())
}
