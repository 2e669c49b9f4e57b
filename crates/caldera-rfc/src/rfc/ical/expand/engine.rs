//! Recurrence expansion.
//!
//! Candidates come from DTSTART, the RRULE (iterated in the master's wall
//! clock) and RDATE. They are deduplicated by instant, EXDATE removes
//! them, and overrides replace them by RECURRENCE-ID instant. Generation
//! stops once a candidate's wall-clock start passes the window end plus
//! the widest UTC offset.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use caldera_core::constants::MAX_UTC_OFFSET_SECONDS;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::{ExpandError, ExpandResult};
use super::rule::{is_bounded, rule_set, wall_clock};
use super::timezone::{TimeZoneResolver, Zone};
use crate::rfc::ical::core::{Component, ComponentKind, Duration, Period, Property, Value, names};
use crate::rfc::ical::object::{CalendarObject, Instance, Moment, TimeWindow};

/// Settings for one expansion.
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Zone floating times and all-day dates are read in.
    pub reference: Tz,
    /// Upper bound on rule candidates generated per object.
    pub max_candidates: usize,
}

impl ExpandOptions {
    #[must_use]
    pub fn new(reference: Tz, max_candidates: usize) -> Self {
        Self {
            reference,
            max_candidates,
        }
    }
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self::new(Tz::UTC, 100_000)
    }
}

/// A value of an occurrence: its declared form and the instant it denotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceTime {
    pub moment: Moment,
    pub utc: DateTime<Utc>,
}

/// One resolved instance of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Component the instance's properties come from.
    pub instance: Instance,
    /// The generated start this instance stands for, in the master's form.
    /// `None` for objects that do not recur.
    pub recurrence_id: Option<OccurrenceTime>,
    pub start: OccurrenceTime,
    pub end: OccurrenceTime,
}

impl Occurrence {
    /// Instant used to order occurrences.
    #[must_use]
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.recurrence_id
            .as_ref()
            .map_or(self.start.utc, |recurrence_id| recurrence_id.utc)
    }
}

/// Earliest start and latest end over every occurrence of an object.
///
/// A `None` bound is open: the rule is unbounded, generation was
/// truncated, or the object has no occurrence at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl Bounds {
    /// Whether any occurrence may intersect the window.
    #[must_use]
    pub fn may_intersect(&self, window: &TimeWindow) -> bool {
        self.earliest.is_none_or(|earliest| earliest <= window.end())
            && self.latest.is_none_or(|latest| latest >= window.start())
    }
}

/// ## Summary
/// Expands an object into the occurrences intersecting `window`, ordered
/// by recurrence instant.
///
/// Rule candidates starting too early to reach the window are skipped
/// without counting towards `max_candidates`.
///
/// ## Errors
/// Returns `ExpandError` for a malformed RRULE, an unknown TZID, a
/// missing start, or more than `max_candidates` rule candidates near the
/// window.
#[tracing::instrument(skip(object, options), fields(uid = %object.uid))]
pub fn expand(
    object: &CalendarObject,
    window: &TimeWindow,
    options: &ExpandOptions,
) -> ExpandResult<Vec<Occurrence>> {
    let expander = Expander::new(object, options);
    let mut occurrences = Vec::new();
    let complete = expander.walk(Limits::around(window), &mut |occurrence| {
        if expander.overlaps(&occurrence, window) {
            occurrences.push(occurrence);
        }
        ControlFlow::Continue(())
    })?;
    if !complete {
        return Err(expander.candidate_limit());
    }
    occurrences.sort_by_key(Occurrence::sort_key);
    tracing::debug!(count = occurrences.len(), "Expanded object");
    Ok(occurrences)
}

/// ## Summary
/// Whether any occurrence intersects `window`; stops at the first one.
///
/// ## Errors
/// Same as [`expand`].
#[tracing::instrument(skip(object, options), fields(uid = %object.uid))]
pub fn intersects(
    object: &CalendarObject,
    window: &TimeWindow,
    options: &ExpandOptions,
) -> ExpandResult<bool> {
    let expander = Expander::new(object, options);
    let mut found = false;
    let complete = expander.walk(Limits::around(window), &mut |occurrence| {
        if expander.overlaps(&occurrence, window) {
            found = true;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    if !found && !complete {
        return Err(expander.candidate_limit());
    }
    Ok(found)
}

/// ## Summary
/// Computes the absolute bounds of every occurrence of an object.
///
/// Floating and all-day occurrences are widened by the widest UTC offset
/// so the bounds hold for any reference zone.
///
/// ## Errors
/// Same as [`expand`].
pub fn bounds(object: &CalendarObject, options: &ExpandOptions) -> ExpandResult<Bounds> {
    let expander = Expander::new(object, options);
    let unbounded_rule = object
        .master
        .as_ref()
        .and_then(|master| master.get_property(names::RRULE))
        .is_some_and(|rule| !is_bounded(&rule.raw_value));

    // An unbounded rule only needs its first candidates for the lower bound.
    let horizon = if unbounded_rule {
        match object.master.as_ref() {
            Some(master) => Some(expander.start_of(master)?.local()),
            None => None,
        }
    } else {
        None
    };

    let widen = TimeDelta::seconds(MAX_UTC_OFFSET_SECONDS);
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;
    let limits = Limits {
        floor: None,
        horizon,
    };
    let complete = expander.walk(limits, &mut |occurrence| {
        let relative = matches!(
            occurrence.start.moment,
            Moment::Date(_) | Moment::Floating(_)
        );
        let (start, end) = if relative {
            (
                shift_utc(occurrence.start.utc, -widen),
                shift_utc(occurrence.end.utc, widen),
            )
        } else {
            (occurrence.start.utc, occurrence.end.utc)
        };
        earliest = Some(earliest.map_or(start, |e| e.min(start)));
        latest = Some(latest.map_or(end, |l| l.max(end)));
        ControlFlow::Continue(())
    })?;

    Ok(Bounds {
        earliest,
        latest: latest.filter(|_| complete && !unbounded_rule),
    })
}

/// Wall-clock range rule candidates are generated over.
#[derive(Debug, Clone, Copy)]
struct Limits {
    /// Candidates starting before this, less the occurrence length, are
    /// skipped and not counted.
    floor: Option<NaiveDateTime>,
    /// Generation stops past this.
    horizon: Option<NaiveDateTime>,
}

impl Limits {
    /// The window widened by the widest UTC offset on both sides, since
    /// wall-clock values can sit that far from their instant.
    fn around(window: &TimeWindow) -> Self {
        let offset = TimeDelta::seconds(MAX_UTC_OFFSET_SECONDS);
        Self {
            floor: Some(shift_local(window.start().naive_utc(), -offset)),
            horizon: Some(shift_local(window.end().naive_utc(), offset)),
        }
    }
}

fn shift_local(local: NaiveDateTime, delta: TimeDelta) -> NaiveDateTime {
    local.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

fn shift_utc(utc: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    utc.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Length of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// Wall-clock difference, for DTEND in the same frame as DTSTART.
    Wall(TimeDelta),
    /// Absolute difference, for DTEND in another frame.
    Exact(TimeDelta),
    /// DURATION: days advance the wall clock, the rest is exact.
    Nominal { days: i64, exact: TimeDelta },
}

impl Span {
    fn from_duration(duration: &Duration) -> Self {
        Self::Nominal {
            days: duration.nominal_days(),
            exact: TimeDelta::seconds(duration.exact_seconds()),
        }
    }

    /// Upper bound on the wall-clock time an occurrence covers, with a
    /// day of slack for DST shifts.
    fn reach(self) -> TimeDelta {
        let length = match self {
            Self::Wall(delta) | Self::Exact(delta) => Some(delta),
            Self::Nominal { days, exact } => {
                TimeDelta::try_days(days).and_then(|days| days.checked_add(&exact))
            }
        };
        length
            .and_then(|length| length.checked_add(&TimeDelta::days(1)))
            .unwrap_or(TimeDelta::MAX)
    }

    /// Zero for timed values, one day for dates.
    fn default_for(start: &Moment) -> Self {
        if start.is_date() {
            Self::Nominal {
                days: 1,
                exact: TimeDelta::zero(),
            }
        } else {
            Self::Exact(TimeDelta::zero())
        }
    }

    fn end_of(self, start: &OccurrenceTime, frame: Zone<'_>) -> OccurrenceTime {
        match self {
            Self::Wall(delta) => {
                let local = shift_local(start.moment.local(), delta);
                OccurrenceTime {
                    moment: start.moment.with_local(local),
                    utc: frame.to_utc(local),
                }
            }
            Self::Exact(delta) => {
                let utc = shift_utc(start.utc, delta);
                OccurrenceTime {
                    moment: start.moment.with_local(frame.to_local(utc)),
                    utc,
                }
            }
            Self::Nominal { days, exact } => {
                let local = shift_local(start.moment.local(), TimeDelta::days(days));
                let utc = shift_utc(frame.to_utc(local), exact);
                OccurrenceTime {
                    moment: start.moment.with_local(frame.to_local(utc)),
                    utc,
                }
            }
        }
    }
}

/// A generated start with its end.
struct Candidate {
    start: OccurrenceTime,
    end: OccurrenceTime,
}

/// EXDATE values of a master.
#[derive(Default)]
struct Exclusions {
    instants: HashSet<DateTime<Utc>>,
    /// DATE values against a timed master remove the whole local day.
    dates: HashSet<NaiveDate>,
}

impl Exclusions {
    fn excludes(&self, start: &OccurrenceTime) -> bool {
        self.instants.contains(&start.utc)
            || (!start.moment.is_date() && self.dates.contains(&start.moment.local().date()))
    }
}

/// Date and date-time values of an RDATE/EXDATE property.
fn moments(prop: &Property) -> Vec<Moment> {
    match &prop.value {
        Value::Date(date) => Moment::from_date(date).into_iter().collect(),
        Value::DateList(dates) => dates.iter().filter_map(Moment::from_date).collect(),
        Value::DateTime(dt) => Moment::from_datetime(dt).into_iter().collect(),
        Value::DateTimeList(list) => list.iter().filter_map(Moment::from_datetime).collect(),
        _ => Vec::new(),
    }
}

struct Expander<'a> {
    object: &'a CalendarObject,
    resolver: TimeZoneResolver,
    options: &'a ExpandOptions,
}

impl<'a> Expander<'a> {
    fn new(object: &'a CalendarObject, options: &'a ExpandOptions) -> Self {
        Self {
            object,
            resolver: TimeZoneResolver::for_object(object, options.reference),
            options,
        }
    }

    fn candidate_limit(&self) -> ExpandError {
        ExpandError::CandidateLimit {
            uid: self.object.uid.clone(),
            limit: self.options.max_candidates,
        }
    }

    /// DTSTART, or DUE for a VTODO without one.
    fn start_of(&self, component: &Component) -> ExpandResult<Moment> {
        let start = component.get_property(names::DTSTART).or_else(|| {
            (self.object.kind == ComponentKind::Todo)
                .then(|| component.get_property(names::DUE))
                .flatten()
        });
        start
            .and_then(Moment::from_property)
            .ok_or_else(|| ExpandError::MissingStart {
                uid: self.object.uid.clone(),
            })
    }

    /// Span declared by DTEND/DUE or DURATION, if any.
    fn span_of(&self, component: &Component, start: &Moment) -> ExpandResult<Option<Span>> {
        let end = component
            .get_property(self.object.kind.end_property())
            .and_then(Moment::from_property);
        if let Some(end) = end {
            if start.same_frame(&end) {
                return Ok(Some(Span::Wall(
                    (end.local() - start.local()).max(TimeDelta::zero()),
                )));
            }
            let from = self.resolver.instant(start)?;
            let to = self.resolver.instant(&end)?;
            return Ok(Some(Span::Exact((to - from).max(TimeDelta::zero()))));
        }
        Ok(component
            .get_property(names::DURATION)
            .and_then(Property::as_duration)
            .map(Span::from_duration))
    }

    /// Feeds every occurrence within `limits` to `visit`, master
    /// candidates first (ascending), then overrides matching no candidate.
    ///
    /// Returns `false` when rule generation was truncated.
    fn walk(
        &self,
        limits: Limits,
        visit: &mut dyn FnMut(Occurrence) -> ControlFlow<()>,
    ) -> ExpandResult<bool> {
        let overrides = self
            .object
            .overrides
            .iter()
            .map(|(recurrence_id, component)| {
                Ok((self.resolver.instant(recurrence_id)?, recurrence_id, component))
            })
            .collect::<ExpandResult<Vec<_>>>()?;
        let mut by_instant = HashMap::with_capacity(overrides.len());
        for (index, (instant, _, _)) in overrides.iter().enumerate() {
            by_instant.entry(*instant).or_insert(index);
        }
        let mut matched = vec![false; overrides.len()];
        let mut complete = true;
        let mut master_span = None;

        if let Some(master) = &self.object.master {
            let start = self.start_of(master)?;
            let frame = self.resolver.frame(&start)?;
            let span = self.span_of(master, &start)?;
            master_span = span;
            let span = span.unwrap_or_else(|| Span::default_for(&start));

            let (candidates, truncated) = self.candidates(master, &start, frame, span, limits)?;
            complete = !truncated;
            let exclusions = self.exclusions(master, &start)?;
            let recurring = self.object.is_recurring();

            for candidate in candidates {
                let recurrence_id = recurring.then(|| candidate.start.clone());
                let occurrence = if let Some(&index) = by_instant.get(&candidate.start.utc) {
                    matched[index] = true;
                    let (_, declared, component) = overrides[index];
                    self.override_occurrence(component, declared, recurrence_id, master_span)?
                } else if exclusions.excludes(&candidate.start) {
                    tracing::trace!(start = %candidate.start.utc, "Candidate excluded");
                    continue;
                } else {
                    Occurrence {
                        instance: Instance::Master,
                        recurrence_id,
                        start: candidate.start,
                        end: candidate.end,
                    }
                };

                if visit(occurrence).is_break() {
                    return Ok(complete);
                }
            }
        }

        for ((instant, declared, component), _) in overrides
            .iter()
            .zip(&matched)
            .filter(|(_, matched)| !**matched)
        {
            let recurrence_id = OccurrenceTime {
                moment: (*declared).clone(),
                utc: *instant,
            };
            let occurrence =
                self.override_occurrence(component, declared, Some(recurrence_id), master_span)?;
            if visit(occurrence).is_break() {
                break;
            }
        }

        Ok(complete)
    }

    /// DTSTART, rule and RDATE candidates, ascending and unique by instant.
    fn candidates(
        &self,
        master: &Component,
        start: &Moment,
        frame: Zone<'_>,
        span: Span,
        limits: Limits,
    ) -> ExpandResult<(Vec<Candidate>, bool)> {
        let floor = limits.floor.map(|floor| shift_local(floor, -span.reach()));
        let before = |local: NaiveDateTime| floor.is_some_and(|floor| local < floor);
        let beyond = |local: NaiveDateTime| limits.horizon.is_some_and(|limit| local > limit);
        let at = |moment: Moment, utc: DateTime<Utc>| {
            let start = OccurrenceTime { moment, utc };
            Candidate {
                end: span.end_of(&start, frame),
                start,
            }
        };

        let mut candidates = vec![at(start.clone(), frame.to_utc(start.local()))];
        let mut truncated = false;

        if let Some(rule) = master.get_property(names::RRULE) {
            let set = rule_set(&rule.raw_value, start.local(), start.is_date(), |utc| {
                frame.to_local(utc)
            })
            .map_err(|reason| ExpandError::MalformedRecurrence {
                uid: self.object.uid.clone(),
                reason,
            })?;

            let mut generated = 0_usize;
            for local in wall_clock(&set) {
                if beyond(local) {
                    break;
                }
                if before(local) {
                    continue;
                }
                if generated == self.options.max_candidates {
                    tracing::warn!(
                        uid = %self.object.uid,
                        limit = self.options.max_candidates,
                        "Candidate limit reached"
                    );
                    truncated = true;
                    break;
                }
                generated += 1;
                tracing::trace!(%local, "Rule candidate");
                candidates.push(at(start.with_local(local), frame.to_utc(local)));
            }
        }

        for prop in master.get_properties(names::RDATE) {
            if let Value::PeriodList(periods) = &prop.value {
                for period in periods {
                    let Some(candidate) = self.period_candidate(period, start, frame)? else {
                        continue;
                    };
                    if !beyond(candidate.start.moment.local()) {
                        candidates.push(candidate);
                    }
                }
                continue;
            }
            for moment in moments(prop) {
                let utc = self.resolver.instant(&moment)?;
                let local = frame.to_local(utc);
                if !beyond(local) {
                    candidates.push(at(start.with_local(local), utc));
                }
            }
        }

        candidates.sort_by_key(|candidate| candidate.start.utc);
        candidates.dedup_by_key(|candidate| candidate.start.utc);
        Ok((candidates, truncated))
    }

    /// An RDATE period: its own start and end, placed in the master's frame.
    fn period_candidate(
        &self,
        period: &Period,
        start: &Moment,
        frame: Zone<'_>,
    ) -> ExpandResult<Option<Candidate>> {
        let Some(declared) = Moment::from_datetime(period.start()) else {
            return Ok(None);
        };
        let own_frame = self.resolver.frame(&declared)?;
        let utc = own_frame.to_utc(declared.local());
        let end_utc = match period {
            Period::Explicit { end, .. } => match Moment::from_datetime(end) {
                Some(end) => self.resolver.instant(&end)?,
                None => utc,
            },
            Period::Duration { duration, .. } => {
                let own_start = OccurrenceTime {
                    moment: declared.clone(),
                    utc,
                };
                Span::from_duration(duration).end_of(&own_start, own_frame).utc
            }
        };

        Ok(Some(Candidate {
            start: OccurrenceTime {
                moment: start.with_local(frame.to_local(utc)),
                utc,
            },
            end: OccurrenceTime {
                moment: start.with_local(frame.to_local(end_utc)),
                utc: end_utc,
            },
        }))
    }

    fn exclusions(&self, master: &Component, start: &Moment) -> ExpandResult<Exclusions> {
        let mut exclusions = Exclusions::default();
        for prop in master.get_properties(names::EXDATE) {
            for moment in moments(prop) {
                if moment.is_date() && !start.is_date() {
                    exclusions.dates.insert(moment.local().date());
                } else {
                    exclusions.instants.insert(self.resolver.instant(&moment)?);
                }
            }
        }
        Ok(exclusions)
    }

    /// An override evaluated on its own start and span. Without DTSTART it
    /// starts at its RECURRENCE-ID; without DTEND or DURATION it keeps the
    /// master's span.
    fn override_occurrence(
        &self,
        component: &Component,
        declared: &Moment,
        recurrence_id: Option<OccurrenceTime>,
        master_span: Option<Span>,
    ) -> ExpandResult<Occurrence> {
        let moment = self
            .start_of(component)
            .unwrap_or_else(|_| declared.clone());
        let frame = self.resolver.frame(&moment)?;
        let span = self
            .span_of(component, &moment)?
            .or(master_span)
            .unwrap_or_else(|| Span::default_for(&moment));
        let start = OccurrenceTime {
            utc: frame.to_utc(moment.local()),
            moment,
        };
        Ok(Occurrence {
            instance: Instance::Override(declared.clone()),
            recurrence_id,
            end: span.end_of(&start, frame),
            start,
        })
    }

    /// Half-open overlap. An empty window matches nothing. Zero-length
    /// timed occurrences match when they start inside the window; all-day
    /// occurrences compare dates in the reference zone, inclusive of the
    /// window's end date.
    fn overlaps(&self, occurrence: &Occurrence, window: &TimeWindow) -> bool {
        if window.start() == window.end() {
            return false;
        }
        if let Moment::Date(first) = occurrence.start.moment {
            let reference = self.resolver.reference();
            let after_first = first.succ_opt().unwrap_or(first);
            let end = occurrence.end.moment.local().date().max(after_first);
            let window_start = reference.to_local(window.start()).date();
            let window_end = reference.to_local(window.end()).date();
            return first <= window_end && end > window_start;
        }

        let (start, end) = (occurrence.start.utc, occurrence.end.utc);
        if start == end {
            window.start() <= start && start < window.end()
        } else {
            start < window.end() && end > window.start()
        }
    }
}
