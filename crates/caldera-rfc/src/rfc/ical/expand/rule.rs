//! Bridge to the `rrule` crate.
//!
//! Rules are iterated in wall-clock time: the local DTSTART is handed to
//! `rrule` as if it were UTC so no zone logic runs inside the crate, and
//! each generated value is resolved to an instant by the caller.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rrule::{RRule, RRuleSet, Unvalidated};

/// ## Summary
/// Builds a rule set for `rule` starting at the wall-clock `dtstart`.
///
/// `UNTIL` is rewritten into the same wall-clock frame: a UTC value goes
/// through `until_to_local`, a DATE value becomes midnight for all-day
/// rules and the last second of that day otherwise. An UNTIL before
/// DTSTART is clamped to DTSTART.
///
/// ## Errors
/// Returns the parser or validator message when the rule is malformed.
pub(crate) fn rule_set(
    rule: &str,
    dtstart: NaiveDateTime,
    all_day: bool,
    until_to_local: impl Fn(DateTime<Utc>) -> NaiveDateTime,
) -> Result<RRuleSet, String> {
    let rule = rule.trim();
    let rule = rule.strip_prefix("RRULE:").unwrap_or(rule);

    let mut parts = Vec::new();
    for part in rule.split(';').filter(|part| !part.is_empty()) {
        match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                let local = until_local(value, all_day, &until_to_local)
                    .ok_or_else(|| format!("invalid UNTIL value '{value}'"))?
                    .max(dtstart);
                parts.push(format!("UNTIL={}", local.format("%Y%m%dT%H%M%SZ")));
            }
            _ => parts.push(part.to_string()),
        }
    }

    let parsed: RRule<Unvalidated> = parts.join(";").parse().map_err(|e| format!("{e}"))?;
    parsed
        .build(rrule::Tz::UTC.from_utc_datetime(&dtstart))
        .map_err(|e| format!("{e}"))
}

fn until_local(
    value: &str,
    all_day: bool,
    until_to_local: impl Fn(DateTime<Utc>) -> NaiveDateTime,
) -> Option<NaiveDateTime> {
    if let Some(utc) = value.strip_suffix(['Z', 'z']) {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(until_to_local(Utc.from_utc_datetime(&naive)));
    }
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return if all_day {
            date.and_hms_opt(0, 0, 0)
        } else {
            date.and_hms_opt(23, 59, 59)
        };
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
}

/// Whether the rule ends on its own (COUNT or UNTIL).
pub(crate) fn is_bounded(rule: &str) -> bool {
    rule.split(';').any(|part| {
        part.split_once('=').is_some_and(|(key, _)| {
            key.trim_start_matches("RRULE:").eq_ignore_ascii_case("COUNT")
                || key.trim_start_matches("RRULE:").eq_ignore_ascii_case("UNTIL")
        })
    })
}

/// Wall-clock values produced by a rule set, ascending.
pub(crate) fn wall_clock(set: &RRuleSet) -> impl Iterator<Item = NaiveDateTime> + '_ {
    set.into_iter().map(|dt| dt.naive_utc())
}
