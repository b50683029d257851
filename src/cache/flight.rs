//! In-process single-flight coordination.
//!
//! One computation per key at a time: the first caller spawns it, every
//! concurrent caller for the same key awaits the same shared handle. The
//! computation runs on its own task, so dropping the caller that started it
//! does not cancel the work other callers are waiting on.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("shared computation for `{key}` aborted: {reason}")]
pub struct FlightAborted {
    pub key: String,
    pub reason: String,
}

/// Whether a caller started the computation or joined one in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    Leader,
    Follower,
}

type SharedOutput<T> = Shared<BoxFuture<'static, Result<T, FlightAborted>>>;

struct Flight<T: Clone> {
    id: u64,
    output: SharedOutput<T>,
}

pub struct FlightGroup<T: Clone> {
    flights: Arc<DashMap<String, Flight<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Await the flight for `key`, starting it with `work` if none is running.
    ///
    /// `work` is dropped unpolled when the caller joins an existing flight.
    pub async fn run<F>(&self, key: &str, work: F) -> (Result<T, FlightAborted>, FlightRole)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (output, role) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(existing) => (existing.get().output.clone(), FlightRole::Follower),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let flights = Arc::clone(&self.flights);
                let owned_key = key.to_string();
                let task = tokio::spawn(async move {
                    let value = work.await;
                    flights.remove_if(&owned_key, |_, flight| flight.id == id);
                    value
                });

                let aborted_key = key.to_string();
                let output = async move {
                    task.await.map_err(|err| FlightAborted {
                        key: aborted_key,
                        reason: err.to_string(),
                    })
                }
                .boxed()
                .shared();

                vacant.insert(Flight {
                    id,
                    output: output.clone(),
                });
                (output, FlightRole::Leader)
            }
        };

        (output.await, role)
    }

    /// Detach the flight for `key` so later callers start a fresh one.
    /// Callers already waiting still receive its result.
    pub fn forget(&self, key: &str) -> bool {
        self.flights.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}
