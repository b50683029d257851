//! Cache storage backends.
//!
//! [`CacheStore`] is the raw medium: byte payloads with a time-to-live.
//! [`MemoryStore`] keeps them in-process; `RedisStore` (see `redis.rs`) keeps
//! them in a shared Redis.

use std::{
    num::NonZeroUsize,
    sync::RwLock,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;

use super::error::CacheError;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The stored payload if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value`, replacing any prior value, valid for `ttl` from now.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Remove any stored value. Absent keys are not an error.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    /// Short backend name used in logs and metrics.
    fn backend(&self) -> &'static str;
}

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// In-process snapshot store with LRU eviction and per-entry expiry.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "invalidate").pop(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
