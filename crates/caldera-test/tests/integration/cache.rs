//! Item cache behaviour as seen through the query coordinator: warm and
//! cold queries agree, damaged records are replaced, changed objects are
//! reparsed, and concurrent processes converge on one record.

use caldera_test::component::caldav::service::outcome::{ObjectFailure, ObjectOutcome};
use caldera_test::fixtures;

use super::helpers::{TestCollection, expanded_calendar, raw_text, request, values};

const DAILY: &str = "event_daily_rrule.ics";

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn warm_cache_matches_cold_cache() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule"]);
    let query = request("20060103T000000Z", "20060110T000000Z", &[DAILY], true);

    let cold = collection.coordinator().await.query(&query).await.expect("Cold query failed");
    assert!(collection.cache_record(DAILY).exists());
    let warm = collection.coordinator().await.query(&query).await.expect("Warm query failed");

    assert_eq!(cold, warm);
    let (_, calendar) = expanded_calendar(&warm[DAILY]);
    assert_eq!(values(&calendar, "RECURRENCE-ID").len(), 7);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unexpanded_then_expanded_on_the_same_record() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule"]);

    let plain = collection
        .coordinator()
        .await
        .query(&request("20060103T000000Z", "20060105T000000Z", &[DAILY], false))
        .await
        .expect("Unexpanded query failed");
    assert!(raw_text(&plain[DAILY]).contains("RRULE:FREQ=DAILY"));

    let expanded = collection
        .coordinator()
        .await
        .query(&request("20060103T000000Z", "20060105T000000Z", &[DAILY], true))
        .await
        .expect("Expanded query failed");
    let (_, calendar) = expanded_calendar(&expanded[DAILY]);
    assert_eq!(
        values(&calendar, "RECURRENCE-ID"),
        ["20060103T170000Z", "20060104T170000Z"]
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn damaged_record_is_replaced_transparently() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule"]);
    let query = request("20060103T000000Z", "20060105T000000Z", &[DAILY], true);
    let coordinator = collection.coordinator().await;

    let before = coordinator.query(&query).await.expect("First query failed");
    let record = collection.cache_record(DAILY);
    let intact = std::fs::read(&record).expect("Record missing");

    // A torn write: the first half of a valid record.
    std::fs::write(&record, &intact[..intact.len() / 2]).expect("Failed to damage record");
    let after = coordinator.query(&query).await.expect("Query over damaged record failed");
    assert_eq!(before, after);
    assert_eq!(std::fs::read(&record).expect("Record missing"), intact);

    std::fs::write(&record, b"not a cache record at all").expect("Failed to damage record");
    let again = collection.coordinator().await.query(&query).await.expect("Query failed");
    assert_eq!(before, again);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn changed_object_is_reparsed() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule"]);
    let query = request("20060103T000000Z", "20060104T000000Z", &[DAILY], true);
    let coordinator = collection.coordinator().await;

    let first = coordinator.query(&query).await.expect("Query failed");
    let (_, calendar) = expanded_calendar(&first[DAILY]);
    assert_eq!(values(&calendar, "SUMMARY"), ["Recurring event"]);

    let edited = fixtures::load("event_daily_rrule")
        .expect("Fixture missing")
        .replace("SUMMARY:Recurring event", "SUMMARY:Renamed event");
    collection.write_object(DAILY, &edited);

    let second = coordinator.query(&query).await.expect("Query failed");
    let (_, calendar) = expanded_calendar(&second[DAILY]);
    assert_eq!(values(&calendar, "SUMMARY"), ["Renamed event"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_processes_converge_on_one_record() {
    let collection = TestCollection::with_fixtures(&["event_issue1812"]);
    let identity = "event_issue1812.ics";
    let query = request("20250101T000000Z", "20250301T000000Z", &[identity], true);

    let mut coordinators = Vec::new();
    for _ in 0..6 {
        coordinators.push(collection.coordinator().await);
    }
    let results = futures::future::join_all(
        coordinators.iter().map(|coordinator| coordinator.query(&query)),
    )
    .await;

    let first = results[0].as_ref().expect("Query failed");
    for result in &results {
        assert_eq!(result.as_ref().expect("Query failed"), first);
    }

    let record = collection.cache_record(identity);
    let item_dir = record.parent().expect("Record has a folder");
    let leftovers: Vec<String> = std::fs::read_dir(item_dir)
        .expect("Cache folder missing")
        .map(|entry| entry.expect("Bad entry").file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "temporaries left behind: {leftovers:?}");
    assert!(record.exists());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unparseable_object_is_never_cached() {
    let collection = TestCollection::with_fixtures(&[]);
    collection.write_object("broken.ics", "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\nEND:VCALENDAR\n");
    let query = request("20060103T000000Z", "20060105T000000Z", &["broken.ics"], true);

    let outcomes = collection.coordinator().await.query(&query).await.expect("Query failed");
    assert!(matches!(outcomes["broken.ics"], ObjectOutcome::Failed(ObjectFailure::Parse(_))));
    assert!(!collection.cache_record("broken.ics").exists());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn disabled_cache_leaves_no_trace() {
    let mut collection = TestCollection::with_fixtures(&["event_daily_rrule"]);
    collection.settings.cache.enabled = false;
    let query = request("20060103T000000Z", "20060105T000000Z", &[DAILY], true);

    let outcomes = collection.coordinator().await.query(&query).await.expect("Query failed");
    let (_, calendar) = expanded_calendar(&outcomes[DAILY]);
    assert_eq!(values(&calendar, "RECURRENCE-ID").len(), 2);
    assert!(!collection.settings.cache.root.exists());
}
