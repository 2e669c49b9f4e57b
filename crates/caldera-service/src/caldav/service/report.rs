//! Calendar-query service layer.
//!
//! Evaluates a time-range query over a batch of stored objects: load each
//! object through the item cache, test it against the window, and return
//! either its stored text or its materialized occurrences.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use caldera_cache::{CacheError, CacheResult, CachedObject, ItemCache};
use caldera_core::config::Settings;
use caldera_core::error::CoreError;
use caldera_rfc::rfc::ical::expand::{
    Bounds, ExpandOptions, bounds, expand, intersects, materialize_calendar,
};
use caldera_rfc::rfc::ical::object::{CalendarObject, TimeWindow};
use chrono_tz::Tz;
use futures::{StreamExt, TryStreamExt};

use super::outcome::{ObjectData, ObjectFailure, ObjectOutcome};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{ObjectStore, StoredObject};

/// One time-range query over a collection.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub window: TimeWindow,
    /// Identities already filtered by the non-temporal criteria.
    pub identities: Vec<String>,
    /// Return materialized occurrences instead of the stored text.
    pub expand: bool,
    /// Zone for floating and all-day values; the configured default if `None`.
    pub reference_zone: Option<Tz>,
}

/// Runs calendar queries for one collection.
pub struct QueryCoordinator<S> {
    store: Arc<S>,
    cache: ItemCache,
    options: ExpandOptions,
    concurrency: usize,
}

impl<S: ObjectStore> QueryCoordinator<S> {
    #[must_use]
    pub fn new(store: S, cache: ItemCache, options: ExpandOptions, concurrency: usize) -> Self {
        Self {
            store: Arc::new(store),
            cache,
            options,
            concurrency: concurrency.max(1),
        }
    }

    /// ## Summary
    /// Builds a coordinator for `collection` from settings.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` for an unknown reference zone and
    /// `CacheError::Unavailable` if the cache folder cannot be created.
    pub fn from_settings(store: S, settings: &Settings, collection: &str) -> ServiceResult<Self> {
        let reference = Tz::from_str(&settings.expansion.reference_timezone).map_err(|e| {
            CoreError::ConfigError(format!("expansion.reference_timezone: {e}"))
        })?;
        let options = ExpandOptions::new(reference, settings.expansion.max_candidates);
        let cache = ItemCache::open(&settings.cache, collection, settings.logging.cache_actions)?;
        Ok(Self::new(store, cache, options, settings.query.concurrency))
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// ## Summary
    /// Evaluates `request` and returns exactly one outcome per requested
    /// identity.
    ///
    /// ## Side Effects
    /// Reads objects from storage and populates the item cache.
    ///
    /// ## Errors
    /// Returns `ServiceError::StorageError` if storage fails for a reason
    /// other than a missing object. Every other problem is reported as that
    /// object's `ObjectOutcome::Failed`.
    #[tracing::instrument(
        skip(self, request),
        fields(objects = request.identities.len(), expand = request.expand)
    )]
    pub async fn query(
        &self,
        request: &QueryRequest,
    ) -> ServiceResult<BTreeMap<String, ObjectOutcome>> {
        let mut options = self.options.clone();
        if let Some(zone) = request.reference_zone {
            options.reference = zone;
        }

        let outcomes: BTreeMap<String, ObjectOutcome> =
            futures::stream::iter(request.identities.iter())
                .map(|identity| {
                    let options = &options;
                    async move {
                        let outcome = self.evaluate(identity, request, options).await?;
                        tracing::debug!(identity, status = outcome.status(), "Evaluated object");
                        Ok::<_, ServiceError>((identity.clone(), outcome))
                    }
                })
                .buffer_unordered(self.concurrency)
                .try_collect()
                .await?;

        tracing::info!(objects = outcomes.len(), "Calendar query complete");
        Ok(outcomes)
    }

    /// ## Summary
    /// Runs `request` over every object in the collection.
    ///
    /// ## Errors
    /// Same as [`Self::query`], plus listing failures.
    pub async fn query_all(
        &self,
        window: TimeWindow,
        expand: bool,
        reference_zone: Option<Tz>,
    ) -> ServiceResult<BTreeMap<String, ObjectOutcome>> {
        let identities = self.store.list_identities().await?;
        self.query(&QueryRequest {
            window,
            identities,
            expand,
            reference_zone,
        })
        .await
    }

    /// ## Summary
    /// Removes cache records for objects no longer in the collection.
    ///
    /// ## Errors
    /// Returns storage errors from listing and cache errors from cleaning.
    pub async fn prune_cache(&self) -> ServiceResult<usize> {
        let live = self.store.list_identities().await?.into_iter().collect();
        Ok(self.cache.prune(live).await?)
    }

    async fn evaluate(
        &self,
        identity: &str,
        request: &QueryRequest,
        options: &ExpandOptions,
    ) -> ServiceResult<ObjectOutcome> {
        let stored = match self.store.read_object(identity).await {
            Ok(stored) => stored,
            Err(ServiceError::NotFound(_)) => {
                return Ok(ObjectOutcome::Failed(ObjectFailure::Missing));
            }
            Err(e) => return Err(e),
        };

        let fingerprint = stored.fingerprint.clone();
        let loader = object_loader(identity.to_string(), stored, self.options.max_candidates);
        let entry = match self.cache.get_or_populate(identity, &fingerprint, loader).await {
            Ok(entry) => entry,
            Err(CacheError::ParseFailure { reason, .. }) => {
                return Ok(ObjectOutcome::Failed(ObjectFailure::Parse(reason)));
            }
            Err(e) => return Ok(ObjectOutcome::Failed(ObjectFailure::Cache(e.to_string()))),
        };

        Ok(filter_object(&entry, &request.window, request.expand, options))
    }
}

/// ## Summary
/// Builds the cache loader for one stored object: decode, parse and
/// precompute bounds.
///
/// Bounds are computed against UTC. Floating and all-day values are
/// widened by the largest offset, so the same bounds hold for any
/// reference zone a later query picks.
fn object_loader(
    identity: String,
    stored: StoredObject,
    max_candidates: usize,
) -> impl FnOnce() -> CacheResult<CachedObject> + Send + 'static {
    move || {
        let StoredObject { bytes, fingerprint } = stored;
        let parse_failure = |reason: String| CacheError::ParseFailure {
            identity: identity.clone(),
            reason,
        };
        let text = String::from_utf8(bytes).map_err(|e| parse_failure(e.to_string()))?;
        let object =
            CalendarObject::from_text(&text, fingerprint).map_err(|e| parse_failure(e.to_string()))?;

        let options = ExpandOptions::new(Tz::UTC, max_candidates);
        let bounds = bounds(&object, &options).unwrap_or_else(|e| {
            // Reported when a query expands the object.
            tracing::debug!(identity = %identity, error = %e, "Object bounds unavailable");
            Bounds::default()
        });
        Ok(CachedObject { object, bounds })
    }
}

/// ## Summary
/// Applies the time-range filter to one parsed object and, when asked,
/// expands it.
fn filter_object(
    entry: &CachedObject,
    window: &TimeWindow,
    expand_requested: bool,
    options: &ExpandOptions,
) -> ObjectOutcome {
    if !entry.bounds.may_intersect(window) {
        return ObjectOutcome::Empty;
    }

    let object = &entry.object;
    if expand_requested {
        match expand(object, window, options) {
            Ok(occurrences) if occurrences.is_empty() => ObjectOutcome::Empty,
            Ok(occurrences) => ObjectOutcome::Matched(ObjectData::Expanded(materialize_calendar(
                object,
                &occurrences,
            ))),
            Err(e) => ObjectOutcome::Failed(ObjectFailure::Expand(e)),
        }
    } else {
        match intersects(object, window, options) {
            Ok(true) => ObjectOutcome::Matched(ObjectData::Raw(object.text.clone())),
            Ok(false) => ObjectOutcome::Empty,
            Err(e) => ObjectOutcome::Failed(ObjectFailure::Expand(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::Path;

    use caldera_core::config::CacheConfig;
    use caldera_rfc::rfc::ical::expand::ExpandError;

    use super::*;
    use crate::storage::fingerprint;

    const DAILY: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:daily\r\n\
DTSTART:20060103T170000Z\r\nDURATION:PT1H\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    const SINGLE: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:single\r\n\
DTSTART:20060104T100000Z\r\nDTEND:20060104T110000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    const FLOATING: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:floating\r\n\
DTSTART:20060104T090000\r\nDTEND:20060104T100000\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    const BAD_RULE: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:bad-rule\r\n\
DTSTART:20060103T170000Z\r\nRRULE:FREQ=SOMETIMES\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    const BAD_ZONE: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:bad-zone\r\n\
DTSTART;TZID=Mars/Olympus_Mons:20060103T170000\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    /// In-memory collection; identities prefixed `io-` fail with an I/O error.
    struct MemoryStore {
        objects: HashMap<String, String>,
    }

    impl MemoryStore {
        fn new(objects: &[(&str, &str)]) -> Self {
            Self {
                objects: objects
                    .iter()
                    .map(|(identity, text)| ((*identity).to_string(), (*text).to_string()))
                    .collect(),
            }
        }
    }

    impl ObjectStore for MemoryStore {
        async fn read_object(&self, identity: &str) -> ServiceResult<StoredObject> {
            if identity.starts_with("io-") {
                return Err(io::Error::other("disk on fire").into());
            }
            let text = self
                .objects
                .get(identity)
                .ok_or_else(|| ServiceError::NotFound(identity.to_string()))?;
            Ok(StoredObject {
                bytes: text.as_bytes().to_vec(),
                fingerprint: fingerprint(text.as_bytes()),
            })
        }

        async fn list_identities(&self) -> ServiceResult<Vec<String>> {
            let mut identities: Vec<String> = self.objects.keys().cloned().collect();
            identities.sort();
            Ok(identities)
        }
    }

    fn coordinator(root: &Path, objects: &[(&str, &str)]) -> QueryCoordinator<MemoryStore> {
        let config = CacheConfig {
            enabled: true,
            root: root.to_path_buf(),
            population_timeout_ms: 5_000,
        };
        let cache = ItemCache::open(&config, "cal", true).unwrap();
        QueryCoordinator::new(MemoryStore::new(objects), cache, ExpandOptions::default(), 4)
    }

    fn request(start: &str, end: &str, identities: &[&str], expand: bool) -> QueryRequest {
        QueryRequest {
            window: TimeWindow::parse(Some(start), Some(end)).unwrap(),
            identities: identities.iter().map(ToString::to_string).collect(),
            expand,
            reference_zone: None,
        }
    }

    fn expanded_text(outcome: &ObjectOutcome) -> String {
        match outcome {
            ObjectOutcome::Matched(data @ ObjectData::Expanded(_)) => data.text().into_owned(),
            other => panic!("expected expanded data, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn unexpanded_match_returns_stored_text() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("daily.ics", DAILY)]);
        let outcomes = coordinator
            .query(&request("20060103T000000Z", "20060105T000000Z", &["daily.ics"], false))
            .await
            .unwrap();

        assert_eq!(
            outcomes["daily.ics"],
            ObjectOutcome::Matched(ObjectData::Raw(DAILY.to_string()))
        );
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn expanded_match_materializes_each_occurrence() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("daily.ics", DAILY)]);
        let outcomes = coordinator
            .query(&request("20060103T000000Z", "20060105T000000Z", &["daily.ics"], true))
            .await
            .unwrap();

        let ObjectOutcome::Matched(data) = &outcomes["daily.ics"] else {
            panic!("expected a match");
        };
        assert_eq!(data.instance_count(), Some(2));
        let text = data.text();
        assert!(text.contains("RECURRENCE-ID:20060103T170000Z"));
        assert!(text.contains("RECURRENCE-ID:20060104T170000Z"));
        assert!(!text.contains("RRULE"));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn one_entry_per_identity_whatever_happens() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(
            root.path(),
            &[
                ("daily.ics", DAILY),
                ("single.ics", SINGLE),
                ("broken.ics", "BEGIN:VCALENDAR\r\nnot a calendar"),
                ("bad-rule.ics", BAD_RULE),
                ("bad-zone.ics", BAD_ZONE),
            ],
        );
        let identities = [
            "daily.ics",
            "single.ics",
            "broken.ics",
            "bad-rule.ics",
            "bad-zone.ics",
            "gone.ics",
        ];
        let outcomes = coordinator
            .query(&request("20060105T000000Z", "20060106T000000Z", &identities, true))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), identities.len());
        assert!(matches!(outcomes["daily.ics"], ObjectOutcome::Matched(_)));
        assert_eq!(outcomes["single.ics"], ObjectOutcome::Empty);
        assert!(matches!(
            outcomes["broken.ics"],
            ObjectOutcome::Failed(ObjectFailure::Parse(_))
        ));
        assert!(matches!(
            outcomes["bad-rule.ics"],
            ObjectOutcome::Failed(ObjectFailure::Expand(ExpandError::MalformedRecurrence { .. }))
        ));
        assert!(matches!(
            outcomes["bad-zone.ics"],
            ObjectOutcome::Failed(ObjectFailure::Expand(ExpandError::UnknownTimezone { .. }))
        ));
        assert_eq!(outcomes["gone.ics"], ObjectOutcome::Failed(ObjectFailure::Missing));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn storage_failure_fails_the_query() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("daily.ics", DAILY)]);
        let err = coordinator
            .query(&request(
                "20060103T000000Z",
                "20060105T000000Z",
                &["daily.ics", "io-daily.ics"],
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StorageError(_)));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn warm_and_cold_cache_agree() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("daily.ics", DAILY)]);
        let query = request("20060103T000000Z", "20060110T000000Z", &["daily.ics"], true);

        let cold = coordinator.query(&query).await.unwrap();
        let warm = coordinator.query(&query).await.unwrap();
        assert_eq!(expanded_text(&cold["daily.ics"]), expanded_text(&warm["daily.ics"]));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn reference_zone_moves_floating_events() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("floating.ics", FLOATING)]);

        // 09:00 floating is 09:00Z in UTC and 14:00Z in New York.
        let mut query = request("20060104T133000Z", "20060104T143000Z", &["floating.ics"], false);
        let in_utc = coordinator.query(&query).await.unwrap();
        assert_eq!(in_utc["floating.ics"], ObjectOutcome::Empty);

        query.reference_zone = Some(chrono_tz::America::New_York);
        let in_new_york = coordinator.query(&query).await.unwrap();
        assert!(matches!(in_new_york["floating.ics"], ObjectOutcome::Matched(_)));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn prune_follows_the_collection() {
        let root = tempfile::tempdir().unwrap();
        let coordinator = coordinator(root.path(), &[("daily.ics", DAILY)]);
        coordinator
            .query_all(TimeWindow::unbounded(), false, None)
            .await
            .unwrap();
        assert_eq!(coordinator.prune_cache().await.unwrap(), 0);

        let emptied = QueryCoordinator::new(
            MemoryStore::new(&[]),
            coordinator.cache.clone(),
            ExpandOptions::default(),
            1,
        );
        assert_eq!(emptied.prune_cache().await.unwrap(), 1);
    }
}
