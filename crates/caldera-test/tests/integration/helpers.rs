//! Test helpers for integration tests.
//!
//! Each test gets its own temporary root holding a collection directory and
//! an item cache directory, so tests run in parallel without sharing state.

use std::path::{Path, PathBuf};

use caldera_test::component::cache::hash_key;
use caldera_test::component::caldav::service::outcome::{ObjectData, ObjectOutcome};
use caldera_test::component::caldav::service::report::{QueryCoordinator, QueryRequest};
use caldera_test::component::config::{
    CacheConfig, ExpansionConfig, LoggingConfig, QueryConfig, Settings, StorageConfig,
};
use caldera_test::component::constants::ITEM_CACHE_DIR;
use caldera_test::component::storage::FsObjectStore;
use caldera_test::fixtures;
use caldera_test::rfc::rfc::ical::core::ICalendar;
use caldera_test::rfc::rfc::ical::object::TimeWindow;
use caldera_test::rfc::rfc::ical::parse::parse;
use tempfile::TempDir;

pub const COLLECTION: &str = "user/calendar.ics";

/// A collection seeded from fixtures plus its cache, both under one
/// temporary root.
pub struct TestCollection {
    _root: TempDir,
    pub settings: Settings,
}

impl TestCollection {
    pub fn with_fixtures(names: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let settings = test_settings(root.path());
        fixtures::install(&settings.storage.collection_root.join(COLLECTION), names)
            .expect("Failed to install fixtures");
        Self {
            _root: root,
            settings,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.settings.storage.collection_root.join(COLLECTION)
    }

    /// A fresh coordinator over the same collection and cache, standing in
    /// for a separate server process.
    pub async fn coordinator(&self) -> QueryCoordinator<FsObjectStore> {
        let store = FsObjectStore::open(&self.settings.storage.collection_root, COLLECTION)
            .await
            .expect("Failed to open collection");
        QueryCoordinator::from_settings(store, &self.settings, COLLECTION)
            .expect("Failed to build coordinator")
    }

    pub fn cache_record(&self, identity: &str) -> PathBuf {
        self.settings
            .cache
            .root
            .join(hash_key(COLLECTION))
            .join(ITEM_CACHE_DIR)
            .join(hash_key(identity))
    }

    pub fn write_object(&self, identity: &str, text: &str) {
        std::fs::write(self.dir().join(identity), text).expect("Failed to write object");
    }
}

/// Test configuration - static struct instead of loading from file.
pub fn test_settings(root: &Path) -> Settings {
    Settings {
        storage: StorageConfig {
            collection_root: root.join("collections"),
        },
        cache: CacheConfig {
            enabled: true,
            root: root.join("cache"),
            population_timeout_ms: 5_000,
        },
        expansion: ExpansionConfig {
            max_candidates: 100_000,
            reference_timezone: "UTC".to_string(),
        },
        query: QueryConfig { concurrency: 4 },
        logging: LoggingConfig {
            level: "debug".to_string(),
            cache_actions: true,
        },
    }
}

pub fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::parse(Some(start), Some(end)).expect("Invalid test window")
}

pub fn request(start: &str, end: &str, identities: &[&str], expand: bool) -> QueryRequest {
    QueryRequest {
        window: window(start, end),
        identities: identities.iter().map(ToString::to_string).collect(),
        expand,
        reference_zone: None,
    }
}

/// Stored text of a raw match.
pub fn raw_text(outcome: &ObjectOutcome) -> &str {
    match outcome {
        ObjectOutcome::Matched(ObjectData::Raw(text)) => text,
        other => panic!("expected raw calendar data, got {other:?}"),
    }
}

/// Serialized calendar of an expanded match, parsed back.
pub fn expanded_calendar(outcome: &ObjectOutcome) -> (String, ICalendar) {
    match outcome {
        ObjectOutcome::Matched(data @ ObjectData::Expanded(_)) => {
            let text = data.text().into_owned();
            let calendar = parse(&text).expect("Expanded output must parse");
            (text, calendar)
        }
        other => panic!("expected expanded calendar data, got {other:?}"),
    }
}

/// Raw values of property `name` across the calendar's components.
pub fn values(calendar: &ICalendar, name: &str) -> Vec<String> {
    calendar
        .root
        .children
        .iter()
        .flat_map(|component| component.get_properties(name))
        .map(|property| property.raw_value.clone())
        .collect()
}

/// Unfolded content lines starting with `prefix`.
pub fn lines_with<'a>(text: &'a str, prefix: &str) -> Vec<&'a str> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.starts_with(prefix))
        .collect()
}
