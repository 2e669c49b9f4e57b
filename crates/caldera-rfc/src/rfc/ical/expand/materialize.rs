//! Occurrence materialization: one expanded occurrence as a standalone,
//! non-recurring component.

use crate::rfc::ical::core::{
    Component, ComponentKind, Date, DateTime, DateTimeForm, ICalendar, Property, names,
};
use crate::rfc::ical::object::{CalendarObject, Moment};

use super::engine::{Occurrence, OccurrenceTime};

/// Writes an occurrence value in its source precision.
///
/// Timed values are written in UTC since the output carries no VTIMEZONE;
/// floating values stay floating and dates stay dates.
fn value_property(name: &str, time: &OccurrenceTime) -> Option<Property> {
    match &time.moment {
        Moment::Date(date) => Date::from_naive(*date).map(|d| Property::date(name, d)),
        Moment::Floating(local) => DateTime::from_naive(*local, DateTimeForm::Floating)
            .map(|dt| Property::datetime(name, dt)),
        Moment::Utc(_) | Moment::Zoned { .. } => {
            DateTime::from_naive(time.utc.naive_utc(), DateTimeForm::Utc)
                .map(|dt| Property::datetime(name, dt))
        }
    }
}

fn replace(component: &mut Component, name: &str, time: &OccurrenceTime) {
    if let Some(prop) = value_property(name, time) {
        component.set_property(prop);
    }
}

/// ## Summary
/// Builds the output component for one occurrence.
///
/// Copies the master or override the occurrence comes from, drops
/// RRULE, RDATE, EXDATE and EXRULE, rewrites the start and end, and sets
/// RECURRENCE-ID to the generated start when the object recurs.
///
/// Returns `None` if the occurrence does not belong to `object`.
#[must_use]
pub fn materialize(object: &CalendarObject, occurrence: &Occurrence) -> Option<Component> {
    let mut component = object.component(&occurrence.instance)?.clone();
    for name in [names::RRULE, names::RDATE, names::EXDATE, names::EXRULE] {
        component.remove_properties(name);
    }

    let end_name = object.kind.end_property();
    let had_end = component.has_property(end_name);
    let had_duration = component.has_property(names::DURATION);

    if !component.has_property(names::DTSTART) && object.kind == ComponentKind::Todo && had_end {
        // A VTODO anchored on DUE alone.
        replace(&mut component, end_name, &occurrence.start);
    } else {
        replace(&mut component, names::DTSTART, &occurrence.start);
        let spans = occurrence.end.moment != occurrence.start.moment
            || occurrence.end.utc != occurrence.start.utc;
        if had_end || (!had_duration && spans) {
            replace(&mut component, end_name, &occurrence.end);
        }
    }

    match &occurrence.recurrence_id {
        Some(recurrence_id) if object.is_recurring() => {
            replace(&mut component, names::RECURRENCE_ID, recurrence_id);
        }
        _ => component.remove_properties(names::RECURRENCE_ID),
    }

    Some(component)
}

/// ## Summary
/// Builds a calendar holding only the materialized occurrences.
#[must_use]
pub fn materialize_calendar(object: &CalendarObject, occurrences: &[Occurrence]) -> ICalendar {
    let mut calendar = ICalendar::default();
    for occurrence in occurrences {
        if let Some(component) = materialize(object, occurrence) {
            calendar.add_component(component);
        }
    }
    calendar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::build::serialize;
    use crate::rfc::ical::expand::{ExpandOptions, expand};
    use crate::rfc::ical::object::TimeWindow;

    const OVERRIDDEN: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
BEGIN:VTIMEZONE\r\nTZID:Europe/Berlin\r\nBEGIN:STANDARD\r\nDTSTART:19701025T030000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\nTZOFFSETFROM:+0200\r\nTZOFFSETTO:+0100\r\n\
END:STANDARD\r\nBEGIN:DAYLIGHT\r\nDTSTART:19700329T020000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\nTZOFFSETFROM:+0100\r\nTZOFFSETTO:+0200\r\n\
END:DAYLIGHT\r\nEND:VTIMEZONE\r\n\
BEGIN:VEVENT\r\nUID:m\r\nDTSTART;TZID=Europe/Berlin:20060103T180000\r\n\
DTEND;TZID=Europe/Berlin:20060103T190000\r\nRRULE:FREQ=DAILY;COUNT=2\r\nSUMMARY:Base\r\n\
END:VEVENT\r\nBEGIN:VEVENT\r\nUID:m\r\nRECURRENCE-ID;TZID=Europe/Berlin:20060104T180000\r\n\
DTSTART;TZID=Europe/Berlin:20060104T200000\r\nDTEND;TZID=Europe/Berlin:20060104T210000\r\n\
SUMMARY:Moved\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn materializes_master_and_override() {
        let object = CalendarObject::from_text(OVERRIDDEN, "fp").unwrap();
        let occurrences =
            expand(&object, &TimeWindow::unbounded(), &ExpandOptions::default()).unwrap();
        let calendar = materialize_calendar(&object, &occurrences);

        assert!(calendar.timezones().is_empty());
        let events = calendar.events();
        assert_eq!(events.len(), 2);
        for event in &events {
            assert!(!event.has_property(names::RRULE));
        }

        let text = serialize(&calendar);
        assert!(text.contains("RECURRENCE-ID:20060103T170000Z\r\n"));
        assert!(text.contains("DTSTART:20060103T170000Z\r\n"));
        assert!(text.contains("RECURRENCE-ID:20060104T170000Z\r\n"));
        assert!(text.contains("DTSTART:20060104T190000Z\r\n"));
        assert!(text.contains("DTEND:20060104T200000Z\r\n"));
        assert!(text.contains("SUMMARY:Moved\r\n"));
        assert!(!text.contains("TZID"));
    }

    #[test]
    fn single_event_passes_through_without_recurrence_id() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:s\r\nDTSTART:20060103T170000Z\r\n\
DURATION:PT1H\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let object = CalendarObject::from_text(text, "fp").unwrap();
        let occurrences =
            expand(&object, &TimeWindow::unbounded(), &ExpandOptions::default()).unwrap();
        let component = materialize(&object, &occurrences[0]).unwrap();
        assert!(component.recurrence_id().is_none());
        assert!(component.has_property(names::DURATION));
        assert!(!component.has_property(names::DTEND));
    }

    #[test]
    fn all_day_values_stay_dates() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20060103\r\n\
RRULE:FREQ=DAILY;COUNT=2\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let object = CalendarObject::from_text(text, "fp").unwrap();
        let occurrences =
            expand(&object, &TimeWindow::unbounded(), &ExpandOptions::default()).unwrap();
        let out = serialize(&materialize_calendar(&object, &occurrences));
        assert!(out.contains("DTSTART;VALUE=DATE:20060104\r\n"));
        assert!(out.contains("DTEND;VALUE=DATE:20060105\r\n"));
        assert!(out.contains("RECURRENCE-ID;VALUE=DATE:20060104\r\n"));
    }
}
