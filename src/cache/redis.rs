//! Redis-backed snapshot store.
//!
//! The connection is established lazily and re-attempted on the next call
//! after a failure, so the service can start (and keep serving from the
//! database) while Redis is down.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::info;

use super::error::CacheError;
use super::store::CacheStore;

const BACKEND: &str = "redis";

pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    op_timeout: Duration,
}

impl RedisStore {
    /// Parse `url` without connecting.
    pub fn new(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| CacheError::InvalidUrl(err.to_string()))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            op_timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .with_timeout("connect", async {
                self.connection
                    .get_or_try_init(|| async {
                        let manager = ConnectionManager::new(self.client.clone()).await?;
                        info!(backend = BACKEND, "cache connection established");
                        Ok::<_, redis::RedisError>(manager)
                    })
                    .await
                    .map(Clone::clone)
                    .map_err(|err| CacheError::unavailable(BACKEND, err))
            })
            .await?;
        Ok(manager)
    }

    async fn with_timeout<T, F>(&self, op: &'static str, future: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.op_timeout, future)
            .await
            .map_err(|_| CacheError::Timeout {
                backend: BACKEND,
                op,
            })?
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection().await?;
        self.with_timeout("get", async move {
            let value: Option<Vec<u8>> = conn
                .get(key)
                .await
                .map_err(|err| CacheError::unavailable(BACKEND, err))?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        self.with_timeout("set", async move {
            conn.set_ex::<_, _, ()>(key, value.to_vec(), seconds)
                .await
                .map_err(|err| CacheError::unavailable(BACKEND, err))
        })
        .await
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        self.with_timeout("invalidate", async move {
            conn.del::<_, ()>(key)
                .await
                .map_err(|err| CacheError::unavailable(BACKEND, err))
        })
        .await
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = RedisStore::new("not a url", Duration::from_millis(50))
            .err()
            .expect("malformed url");
        assert!(matches!(err, CacheError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn unreachable_server_fails_soft_with_error() {
        // Port 1 is reserved and refuses connections on test hosts.
        let store = RedisStore::new("redis://127.0.0.1:1/", Duration::from_millis(200))
            .expect("url parses");
        assert!(store.get("vestige:test").await.is_err());
        assert!(store.invalidate("vestige:test").await.is_err());
    }
}
