//! Read-through snapshot cache.
//!
//! Wraps a [`CacheStore`] with the behaviour readers and writers rely on:
//! medium failures degrade to misses, concurrent misses for one key share a
//! single population, failed populations are never stored, and an
//! invalidation prevents any population already in progress from writing a
//! result computed before it.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use dashmap::DashMap;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::error::CacheError;
use super::flight::{FlightAborted, FlightGroup, FlightRole};
use super::store::CacheStore;

pub struct SnapshotCache<E: Clone> {
    store: Arc<dyn CacheStore>,
    flights: FlightGroup<Result<Bytes, E>>,
    epochs: Arc<DashMap<String, u64>>,
}

impl<E> SnapshotCache<E>
where
    E: Clone + Send + Sync + From<FlightAborted> + 'static,
{
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            flights: FlightGroup::new(),
            epochs: Arc::new(DashMap::new()),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Cached payload, or `None` on a miss or when the medium is unreachable.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                counter!("vestige_cache_hit_total").increment(1);
                debug!(cache = self.backend(), key, outcome = "hit", "cache lookup");
                Some(bytes)
            }
            Ok(None) => {
                counter!("vestige_cache_miss_total").increment(1);
                debug!(cache = self.backend(), key, outcome = "miss", "cache lookup");
                None
            }
            Err(err) => {
                record_cache_error(self.backend(), "get", key, &err);
                None
            }
        }
    }

    /// Store a payload. Failures are logged and otherwise ignored.
    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        if let Err(err) = self.store.set(key, value, ttl).await {
            record_cache_error(self.backend(), "set", key, &err);
        }
    }

    /// Drop the stored payload and supersede any population in progress.
    ///
    /// The supersede step completes before the first await, and the delete
    /// runs on its own task, so a caller that goes away mid-call still
    /// leaves the key invalidated. The error is returned so callers can log
    /// it in their own context.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.supersede(key);

        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let delete = tokio::spawn(async move { store.invalidate(&owned_key).await });

        let result = match delete.await {
            Ok(result) => result,
            Err(join) => Err(CacheError::unavailable(self.backend(), join)),
        };
        result.map_err(|err| {
            record_cache_error(self.backend(), "invalidate", key, &err);
            err
        })
    }

    fn supersede(&self, key: &str) {
        *self.epochs.entry(key.to_string()).or_insert(0) += 1;
        self.flights.forget(key);
    }

    /// Cached bytes on a hit; otherwise the result of a single shared
    /// execution of `compute`, stored for `ttl` when it succeeds.
    pub async fn get_or_populate<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, E>> + Send + 'static,
    {
        if let Some(bytes) = self.get(key).await {
            return Ok(bytes);
        }

        let epoch = current_epoch(&self.epochs, key);
        let store = Arc::clone(&self.store);
        let epochs = Arc::clone(&self.epochs);
        let owned_key = key.to_string();

        let work = async move {
            let started = Instant::now();
            let bytes = compute().await?;
            counter!("vestige_cache_populate_total").increment(1);
            histogram!("vestige_cache_populate_ms").record(started.elapsed().as_secs_f64() * 1000.0);

            commit(store.as_ref(), &epochs, &owned_key, epoch, &bytes, ttl).await;
            Ok::<Bytes, E>(bytes)
        };

        let (outcome, role) = self.flights.run(key, work).await;
        if role == FlightRole::Follower {
            counter!("vestige_cache_flight_joined_total").increment(1);
        }

        match outcome {
            Ok(result) => result,
            Err(aborted) => Err(E::from(aborted)),
        }
    }

    /// `true` while a population for `key` is running and joinable.
    pub fn is_populating(&self, key: &str) -> bool {
        self.flights.contains(key)
    }
}

/// Store a finished population unless an invalidation superseded it. An
/// invalidation that lands while the value is being written is caught by the
/// second epoch check, and the value is deleted again.
async fn commit(
    store: &dyn CacheStore,
    epochs: &DashMap<String, u64>,
    key: &str,
    epoch: u64,
    bytes: &Bytes,
    ttl: Duration,
) {
    if current_epoch(epochs, key) != epoch {
        debug!(key, "population superseded by invalidation; result not stored");
        return;
    }
    if let Err(err) = store.set(key, bytes.clone(), ttl).await {
        record_cache_error(store.backend(), "set", key, &err);
        return;
    }
    if current_epoch(epochs, key) != epoch {
        debug!(key, "population superseded while storing; result withdrawn");
        if let Err(err) = store.invalidate(key).await {
            record_cache_error(store.backend(), "invalidate", key, &err);
        }
    }
}

fn current_epoch(epochs: &DashMap<String, u64>, key: &str) -> u64 {
    epochs.get(key).map(|epoch| *epoch).unwrap_or(0)
}

fn record_cache_error(backend: &'static str, op: &'static str, key: &str, err: &CacheError) {
    counter!("vestige_cache_error_total", "op" => op).increment(1);
    warn!(
        cache = backend,
        op,
        key,
        error = %err,
        "cache medium failed; continuing without it"
    );
}
