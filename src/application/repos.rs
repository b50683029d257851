//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{GameObjectRecord, MessageRecord, PhantomRecord};
use crate::domain::traces::NewTraceBundle;

/// Persistence failures. `Clone` so one failed shared population can be
/// handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("connection pool exhausted")]
    PoolExhausted,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Ids assigned to the rows of one committed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedBundle {
    pub object_id: Option<i64>,
    pub message_id: Option<i64>,
    pub phantom_id: i64,
}

#[async_trait]
pub trait TraceRepo: Send + Sync {
    /// Persist every entity in the bundle as one atomic unit.
    async fn insert_bundle(&self, bundle: &NewTraceBundle) -> Result<InsertedBundle, RepoError>;

    /// Up to `limit` objects, newest first.
    async fn latest_objects(&self, limit: u32) -> Result<Vec<GameObjectRecord>, RepoError>;

    async fn latest_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, RepoError>;

    async fn latest_phantoms(&self, limit: u32) -> Result<Vec<PhantomRecord>, RepoError>;

    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
