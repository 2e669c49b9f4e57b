use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use caldera_core::config::CacheConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{CacheError, CacheResult};
use crate::record::{CachedObject, Lookup};
use crate::store::{DiskStore, Published};

type FlightKey = (String, String);
type Flight = Shared<BoxFuture<'static, CacheResult<Arc<CachedObject>>>>;

/// Item cache for one collection.
///
/// Concurrent callers asking for the same (identity, fingerprint) share a
/// single population. The population runs on its own task, so it finishes
/// and publishes even if the caller that started it goes away.
#[derive(Clone)]
pub struct ItemCache {
    store: Option<Arc<DiskStore>>,
    in_flight: Arc<DashMap<FlightKey, Flight>>,
    population_timeout: Duration,
    log_actions: bool,
}

impl ItemCache {
    /// ## Summary
    /// Opens the cache for `collection`. A disabled cache never touches disk
    /// and runs every loader directly.
    ///
    /// ## Errors
    /// Returns `CacheError::Unavailable` if the record folder cannot be created.
    pub fn open(config: &CacheConfig, collection: &str, log_actions: bool) -> CacheResult<Self> {
        let store = if config.enabled {
            let store = DiskStore::open(&config.root, collection)
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Some(Arc::new(store))
        } else {
            None
        };
        Ok(Self {
            store,
            in_flight: Arc::new(DashMap::new()),
            population_timeout: config.population_timeout(),
            log_actions,
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Number of populations currently running.
    #[must_use]
    pub fn pending_populations(&self) -> usize {
        self.in_flight.len()
    }

    /// ## Summary
    /// Returns the cached object for `identity` at `fingerprint`, running
    /// `loader` to build it when no valid record exists.
    ///
    /// A caller that finds a population already running waits for it up to
    /// the configured timeout, then runs its own `loader` instead.
    ///
    /// ## Side Effects
    /// Publishes the loaded object to disk. Failures to publish are logged
    /// and do not fail the call. Failed loads are never stored.
    ///
    /// ## Errors
    /// Returns the loader's error, or `CacheError::PopulationAborted` if the
    /// population task died.
    pub async fn get_or_populate<F>(
        &self,
        identity: &str,
        fingerprint: &str,
        loader: F,
    ) -> CacheResult<Arc<CachedObject>>
    where
        F: FnOnce() -> CacheResult<CachedObject> + Send + 'static,
    {
        let Some(store) = &self.store else {
            return load(loader).await.map(Arc::new);
        };

        match read(store, identity, fingerprint).await {
            Lookup::Hit(entry) => {
                if self.log_actions {
                    tracing::debug!(identity, fingerprint, "Cache hit");
                }
                return Ok(entry);
            }
            Lookup::Miss => {
                if self.log_actions {
                    tracing::debug!(identity, fingerprint, "Cache miss");
                }
            }
            Lookup::Stale { stored } => {
                if self.log_actions {
                    tracing::debug!(identity, fingerprint, %stored, "Cache record outdated");
                }
            }
            Lookup::Corrupt(reason) => {
                tracing::warn!(identity, %reason, "Ignoring corrupt cache record");
            }
        }

        let key = (identity.to_owned(), fingerprint.to_owned());
        let (flight, loader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), Some(loader)),
            Entry::Vacant(vacant) => {
                let flight = self.spawn_population(key, Arc::clone(store), loader);
                vacant.insert(flight.clone());
                (flight, None)
            }
        };

        let Some(loader) = loader else {
            return flight.await;
        };
        if self.log_actions {
            tracing::debug!(identity, fingerprint, "Waiting for running population");
        }
        match tokio::time::timeout(self.population_timeout, flight).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    identity,
                    timeout = ?self.population_timeout,
                    "Population wait timed out; loading directly"
                );
                populate(Arc::clone(store), identity, fingerprint, loader, self.log_actions).await
            }
        }
    }

    /// ## Summary
    /// Deletes records for identities not in `live`.
    ///
    /// ## Errors
    /// Returns `CacheError::Unavailable` if the record folder cannot be cleaned.
    pub async fn prune(&self, live: HashSet<String>) -> CacheResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let store = Arc::clone(store);
        let removed = tokio::task::spawn_blocking(move || store.prune(&live))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        tracing::info!(removed, "Pruned item cache");
        Ok(removed)
    }

    fn spawn_population<F>(&self, key: FlightKey, store: Arc<DiskStore>, loader: F) -> Flight
    where
        F: FnOnce() -> CacheResult<CachedObject> + Send + 'static,
    {
        let in_flight = Arc::clone(&self.in_flight);
        let log_actions = self.log_actions;
        let task = tokio::spawn(async move {
            let result = populate(store, &key.0, &key.1, loader, log_actions).await;
            // Blocks until the caller that registered this flight releases the shard.
            in_flight.remove(&key);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::PopulationAborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

async fn read(store: &Arc<DiskStore>, identity: &str, fingerprint: &str) -> Lookup {
    let store = Arc::clone(store);
    let identity = identity.to_owned();
    let fingerprint = fingerprint.to_owned();
    match tokio::task::spawn_blocking(move || store.load(&identity, &fingerprint)).await {
        Ok(lookup) => lookup,
        Err(e) => Lookup::Corrupt(format!("read task failed: {e}")),
    }
}

async fn load<F>(loader: F) -> CacheResult<CachedObject>
where
    F: FnOnce() -> CacheResult<CachedObject> + Send + 'static,
{
    tokio::task::spawn_blocking(loader)
        .await
        .map_err(|e| CacheError::PopulationAborted(e.to_string()))?
}

async fn populate<F>(
    store: Arc<DiskStore>,
    identity: &str,
    fingerprint: &str,
    loader: F,
    log_actions: bool,
) -> CacheResult<Arc<CachedObject>>
where
    F: FnOnce() -> CacheResult<CachedObject> + Send + 'static,
{
    let entry = Arc::new(load(loader).await?);

    let record = Arc::clone(&entry);
    let target = identity.to_owned();
    let version = fingerprint.to_owned();
    let published =
        tokio::task::spawn_blocking(move || store.publish(&target, &version, &record)).await;
    match published {
        Ok(Ok(Published::Written)) => {
            if log_actions {
                tracing::debug!(identity, "Published cache record");
            }
        }
        Ok(Ok(Published::AlreadyCurrent)) => {
            if log_actions {
                tracing::debug!(identity, "Cache record already current");
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(identity, error = %e, "Cannot publish cache record");
        }
        Err(e) => {
            tracing::warn!(identity, error = %e, "Publish task failed");
        }
    }
    Ok(entry)
}
