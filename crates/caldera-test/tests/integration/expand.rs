//! Expansion scenarios, checked the way a CalDAV client sees them: the
//! unexpanded response keeps the rule and timezone definitions, the
//! expanded response holds one component per occurrence.

use std::collections::BTreeSet;

use caldera_test::component::caldav::service::outcome::{ObjectFailure, ObjectOutcome};
use caldera_test::rfc::rfc::ical::expand::ExpandError;

use super::helpers::{
    TestCollection, expanded_calendar, lines_with, raw_text, request, values,
};

struct Expected<'a> {
    fixture: &'a str,
    start: &'a str,
    end: &'a str,
    recurrence_ids: &'a [&'a str],
    starts: &'a [&'a str],
    ends: &'a [&'a str],
    /// Whether the stored object carries VTIMEZONE definitions.
    zoned: bool,
    /// Components sharing the UID in the stored object.
    stored_components: usize,
}

async fn assert_expansion(expected: &Expected<'_>) {
    let collection = TestCollection::with_fixtures(&[expected.fixture]);
    let coordinator = collection.coordinator().await;
    let identity = format!("{}.ics", expected.fixture);

    let unexpanded = coordinator
        .query(&request(expected.start, expected.end, &[&identity], false))
        .await
        .expect("Unexpanded query failed");
    let text = raw_text(&unexpanded[&identity]);
    assert!(text.contains("RRULE"));
    assert_eq!(text.contains("BEGIN:VTIMEZONE"), expected.zoned);
    if expected.stored_components == 1 {
        assert!(!text.contains("RECURRENCE-ID"));
    }
    let uid_line = format!("UID:{}", expected.fixture);
    let uids = lines_with(text, "UID:");
    assert_eq!(uids.len(), expected.stored_components);
    assert!(uids.iter().all(|line| *line == uid_line));

    let expanded = coordinator
        .query(&request(expected.start, expected.end, &[&identity], true))
        .await
        .expect("Expanded query failed");
    let (text, calendar) = expanded_calendar(&expanded[&identity]);
    assert!(!text.contains("RRULE"));
    assert!(!text.contains("BEGIN:VTIMEZONE"));
    assert_eq!(lines_with(&text, "UID:").len(), expected.recurrence_ids.len());
    assert!(lines_with(&text, "UID:").iter().all(|line| *line == uid_line));

    let recurrence_ids = values(&calendar, "RECURRENCE-ID");
    assert_eq!(recurrence_ids, expected.recurrence_ids);
    let unique: BTreeSet<&String> = recurrence_ids.iter().collect();
    assert_eq!(unique.len(), recurrence_ids.len());
    assert_eq!(values(&calendar, "DTSTART"), expected.starts);
    assert_eq!(values(&calendar, "DTEND"), expected.ends);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_daily_rule() {
    assert_expansion(&Expected {
        fixture: "event_daily_rrule",
        start: "20060103T000000Z",
        end: "20060105T000000Z",
        recurrence_ids: &["20060103T170000Z", "20060104T170000Z"],
        starts: &["20060103T170000Z", "20060104T170000Z"],
        ends: &["20060103T180000Z", "20060104T180000Z"],
        zoned: true,
        stored_components: 1,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_window_starting_inside_an_occurrence() {
    assert_expansion(&Expected {
        fixture: "event_daily_rrule",
        start: "20060103T171500Z",
        end: "20060105T000000Z",
        recurrence_ids: &["20060103T170000Z", "20060104T170000Z"],
        starts: &["20060103T170000Z", "20060104T170000Z"],
        ends: &["20060103T180000Z", "20060104T180000Z"],
        zoned: true,
        stored_components: 1,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_window_inside_one_occurrence() {
    assert_expansion(&Expected {
        fixture: "event_daily_rrule",
        start: "20060103T171500Z",
        end: "20060103T171501Z",
        recurrence_ids: &["20060103T170000Z"],
        starts: &["20060103T170000Z"],
        ends: &["20060103T180000Z"],
        zoned: true,
        stored_components: 1,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_overnight_rule_with_many_overrides_in_winter() {
    assert_expansion(&Expected {
        fixture: "event_issue1812",
        start: "20250127T183000Z",
        end: "20250127T183001Z",
        recurrence_ids: &["20250127T180000Z"],
        starts: &["20250127T180000Z"],
        ends: &["20250127T233000Z"],
        zoned: true,
        stored_components: 11,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_overnight_rule_with_many_overrides_in_summer() {
    assert_expansion(&Expected {
        fixture: "event_issue1812",
        start: "20250627T183000Z",
        end: "20250627T183001Z",
        recurrence_ids: &["20250627T170000Z"],
        starts: &["20250627T170000Z"],
        ends: &["20250627T223000Z"],
        zoned: true,
        stored_components: 11,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_all_day_rule() {
    assert_expansion(&Expected {
        fixture: "event_full_day_rrule",
        start: "20060103T000000Z",
        end: "20060105T000000Z",
        recurrence_ids: &["20060103", "20060104", "20060105"],
        starts: &["20060103", "20060104", "20060105"],
        ends: &["20060104", "20060105", "20060106"],
        zoned: false,
        stored_components: 1,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_overridden_occurrence() {
    assert_expansion(&Expected {
        fixture: "event_daily_rrule_overridden",
        start: "20060103T000000Z",
        end: "20060105T000000Z",
        recurrence_ids: &["20060103T170000Z", "20060104T170000Z"],
        starts: &["20060103T170000Z", "20060104T190000Z"],
        ends: &["20060103T180000Z", "20060104T200000Z"],
        zoned: true,
        stored_components: 2,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn expand_across_daylight_saving_change() {
    assert_expansion(&Expected {
        fixture: "event_weekly_rrule",
        start: "20060320T000000Z",
        end: "20060414T000000Z",
        recurrence_ids: &[
            "20060321T200000Z",
            "20060328T200000Z",
            "20060404T190000Z",
            "20060411T190000Z",
        ],
        starts: &[
            "20060321T200000Z",
            "20060328T200000Z",
            "20060404T190000Z",
            "20060411T190000Z",
        ],
        ends: &[],
        zoned: true,
        stored_components: 1,
    })
    .await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn single_event_passes_through_unchanged() {
    let collection = TestCollection::with_fixtures(&["event_single"]);
    let coordinator = collection.coordinator().await;

    let outcomes = coordinator
        .query(&request("20060104T000000Z", "20060105T000000Z", &["event_single.ics"], true))
        .await
        .expect("Query failed");
    let (text, calendar) = expanded_calendar(&outcomes["event_single.ics"]);
    assert!(!text.contains("RECURRENCE-ID"));
    assert_eq!(values(&calendar, "DTSTART"), ["20060104T100000Z"]);
    assert_eq!(values(&calendar, "SUMMARY"), ["One-off meeting"]);

    let outside = coordinator
        .query(&request("20060104T110000Z", "20060105T000000Z", &["event_single.ics"], true))
        .await
        .expect("Query failed");
    assert_eq!(outside["event_single.ics"], ObjectOutcome::Empty);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn todo_anchored_on_due_expands_due() {
    let collection = TestCollection::with_fixtures(&["todo_daily_due"]);
    let coordinator = collection.coordinator().await;

    let outcomes = coordinator
        .query(&request("20060101T000000Z", "20060201T000000Z", &["todo_daily_due.ics"], true))
        .await
        .expect("Query failed");
    let (_, calendar) = expanded_calendar(&outcomes["todo_daily_due.ics"]);
    assert_eq!(
        values(&calendar, "DUE"),
        ["20060103T090000Z", "20060104T090000Z", "20060105T090000Z"]
    );
    assert!(values(&calendar, "DTSTART").is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn rule_and_zone_failures_are_per_object() {
    let collection = TestCollection::with_fixtures(&[
        "event_bad_rrule",
        "event_unknown_tz",
        "event_daily_rrule",
    ]);
    let coordinator = collection.coordinator().await;

    let outcomes = coordinator
        .query(&request(
            "20060103T000000Z",
            "20060105T000000Z",
            &["event_bad_rrule.ics", "event_unknown_tz.ics", "event_daily_rrule.ics"],
            true,
        ))
        .await
        .expect("Query failed");

    assert!(matches!(
        &outcomes["event_bad_rrule.ics"],
        ObjectOutcome::Failed(ObjectFailure::Expand(ExpandError::MalformedRecurrence { uid, .. }))
            if uid == "event_bad_rrule"
    ));
    assert!(matches!(
        &outcomes["event_unknown_tz.ics"],
        ObjectOutcome::Failed(ObjectFailure::Expand(ExpandError::UnknownTimezone { tzid }))
            if tzid == "Atlantis/Central"
    ));
    assert!(matches!(outcomes["event_daily_rrule.ics"], ObjectOutcome::Matched(_)));
}
