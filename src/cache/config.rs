//! Cache configuration.
//!
//! Derived from the `[cache]` section of `vestige.toml`.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_TTL_SECS: u64 = 30;
const DEFAULT_MEMORY_CAPACITY: usize = 64;
const DEFAULT_OP_TIMEOUT_MS: u64 = 250;

/// Where snapshots live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process LRU; not shared between server processes.
    Memory,
    /// External Redis reachable at the given URL.
    Redis(String),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Disabling the cache sends every read straight to the store.
    pub enabled: bool,
    pub backend: CacheBackend,
    pub ttl: Duration,
    pub memory_capacity: usize,
    /// Upper bound on a single call to an external cache medium.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let backend = match settings.url.as_deref() {
            Some(url) if url.starts_with("redis://") || url.starts_with("rediss://") => {
                CacheBackend::Redis(url.to_string())
            }
            _ => CacheBackend::Memory,
        };

        Self {
            enabled: settings.enabled,
            backend,
            ttl: settings.ttl,
            memory_capacity: settings.memory_capacity.get(),
            op_timeout: settings.op_timeout,
        }
    }
}

impl CacheConfig {
    /// Memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Seconds advertised to HTTP clients via `Cache-Control`.
    pub fn max_age_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}
