//! Batch behaviour of calendar queries over a whole collection.

use std::collections::BTreeMap;

use caldera_test::component::caldav::service::outcome::{ObjectFailure, ObjectOutcome};
use caldera_test::component::error::ServiceError;
use caldera_test::component::storage::{FsObjectStore, ObjectStore};

use super::helpers::{COLLECTION, TestCollection, expanded_calendar, request, values, window};

const ALL: &[&str] = &[
    "event_daily_rrule",
    "event_daily_rrule_overridden",
    "event_weekly_rrule",
    "event_full_day_rrule",
    "event_single",
    "event_issue1812",
    "todo_daily_due",
    "event_bad_rrule",
    "event_unknown_tz",
];

fn statuses(outcomes: &BTreeMap<String, ObjectOutcome>) -> BTreeMap<&str, &'static str> {
    outcomes
        .iter()
        .map(|(identity, outcome)| (identity.as_str(), outcome.status()))
        .collect()
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn whole_collection_gets_one_entry_per_object() {
    let collection = TestCollection::with_fixtures(ALL);
    let coordinator = collection.coordinator().await;

    let outcomes = coordinator
        .query_all(window("20060103T000000Z", "20060105T000000Z"), false, None)
        .await
        .expect("Query failed");

    let expected = BTreeMap::from([
        ("event_bad_rrule.ics", "failed"),
        ("event_daily_rrule.ics", "matched"),
        ("event_daily_rrule_overridden.ics", "matched"),
        ("event_full_day_rrule.ics", "matched"),
        ("event_issue1812.ics", "empty"),
        ("event_single.ics", "matched"),
        ("event_unknown_tz.ics", "failed"),
        ("event_weekly_rrule.ics", "matched"),
        ("todo_daily_due.ics", "matched"),
    ]);
    assert_eq!(statuses(&outcomes), expected);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn missing_object_does_not_disturb_siblings() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule", "event_single"]);
    let coordinator = collection.coordinator().await;

    let outcomes = coordinator
        .query(&request(
            "20060103T000000Z",
            "20060105T000000Z",
            &["event_daily_rrule.ics", "deleted.ics", "event_single.ics"],
            true,
        ))
        .await
        .expect("Query failed");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes["deleted.ics"], ObjectOutcome::Failed(ObjectFailure::Missing));
    assert_eq!(outcomes["event_single.ics"].status(), "matched");
    assert_eq!(outcomes["event_daily_rrule.ics"].status(), "matched");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn concurrency_does_not_change_results() {
    let mut collection = TestCollection::with_fixtures(ALL);
    let mut query = request("20060101T000000Z", "20060201T000000Z", &[], true);
    query.identities = ALL.iter().map(|name| format!("{name}.ics")).collect();

    let parallel = collection.coordinator().await.query(&query).await.expect("Query failed");
    collection.settings.query.concurrency = 1;
    let serial = collection.coordinator().await.query(&query).await.expect("Query failed");
    assert_eq!(parallel, serial);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn reference_zone_decides_all_day_dates() {
    let collection = TestCollection::with_fixtures(&["event_full_day_rrule"]);
    let coordinator = collection.coordinator().await;
    let identity = "event_full_day_rrule.ics";
    let mut query = request("20060103T000000Z", "20060103T020000Z", &[identity], true);

    let in_utc = coordinator.query(&query).await.expect("Query failed");
    let (_, calendar) = expanded_calendar(&in_utc[identity]);
    assert_eq!(values(&calendar, "RECURRENCE-ID"), ["20060103"]);

    // 00:00-02:00Z is still the evening of January 2nd in New York.
    query.reference_zone = Some(chrono_tz::America::New_York);
    let in_new_york = coordinator.query(&query).await.expect("Query failed");
    let (_, calendar) = expanded_calendar(&in_new_york[identity]);
    assert_eq!(values(&calendar, "RECURRENCE-ID"), ["20060102"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn prune_drops_records_of_deleted_objects() {
    let collection = TestCollection::with_fixtures(&["event_daily_rrule", "event_single"]);
    let coordinator = collection.coordinator().await;
    coordinator
        .query_all(window("20060101T000000Z", "20060201T000000Z"), false, None)
        .await
        .expect("Query failed");
    assert!(collection.cache_record("event_single.ics").exists());

    std::fs::remove_file(collection.dir().join("event_single.ics")).expect("Failed to delete");
    assert_eq!(coordinator.prune_cache().await.expect("Prune failed"), 1);
    assert!(!collection.cache_record("event_single.ics").exists());
    assert!(collection.cache_record("event_daily_rrule.ics").exists());
}

#[test_log::test(tokio::test)]
async fn unknown_collection_is_not_found() {
    let collection = TestCollection::with_fixtures(&[]);
    let root = &collection.settings.storage.collection_root;

    assert!(matches!(
        FsObjectStore::open(root, "user/other.ics").await,
        Err(ServiceError::NotFound(_))
    ));
    let store = FsObjectStore::open(root, COLLECTION).await.expect("Collection missing");
    assert!(store.list_identities().await.expect("Listing failed").is_empty());
}
