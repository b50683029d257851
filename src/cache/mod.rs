//! Snapshot caching for the trace window.
//!
//! A snapshot is the gzip-compressed JSON of the most recent window, stored
//! under a single key. Readers go through [`SnapshotCache`]; the write path
//! only ever invalidates.
//!
//! ```toml
//! [cache]
//! url = "redis://127.0.0.1:6379/"  # omit for the in-process store
//! ttl_seconds = 30
//! ```

mod codec;
mod config;
mod error;
mod flight;
mod keys;
mod lock;
mod redis;
mod snapshot;
mod store;

use std::sync::Arc;

pub use codec::{gunzip, gzip};
pub use config::{CacheBackend, CacheConfig};
pub use error::CacheError;
pub use flight::{FlightAborted, FlightGroup, FlightRole};
pub use keys::{KEY_PREFIX, WINDOW_KEY, namespaced};
pub use redis::RedisStore;
pub use snapshot::SnapshotCache;
pub use store::{CacheStore, MemoryStore};

/// Construct the store selected by `config`. Connecting to Redis is deferred
/// to first use, so only a malformed URL fails here.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match &config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new(
            config.memory_capacity_non_zero(),
        ))),
        CacheBackend::Redis(url) => Ok(Arc::new(RedisStore::new(url, config.op_timeout)?)),
    }
}
