//! Read path: the recent trace window served to every player.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::application::repos::{RepoError, TraceRepo};
use crate::cache::{FlightAborted, SnapshotCache, WINDOW_KEY, gunzip, gzip};
use crate::domain::entities::TraceWindow;

pub const DEFAULT_WINDOW_OBJECTS: u32 = 200;
pub const DEFAULT_WINDOW_MESSAGES: u32 = 200;
pub const DEFAULT_WINDOW_PHANTOMS: u32 = 20;

#[derive(Debug, Clone, Error)]
pub enum WindowError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to encode trace window: {0}")]
    Encode(String),
    #[error("window population aborted: {0}")]
    Aborted(String),
}

impl From<FlightAborted> for WindowError {
    fn from(err: FlightAborted) -> Self {
        Self::Aborted(err.reason)
    }
}

/// Per-kind caps on the served window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub objects: u32,
    pub messages: u32,
    pub phantoms: u32,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            objects: DEFAULT_WINDOW_OBJECTS,
            messages: DEFAULT_WINDOW_MESSAGES,
            phantoms: DEFAULT_WINDOW_PHANTOMS,
        }
    }
}

/// A gzip-compressed JSON rendering of a [`TraceWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    gzip: Bytes,
}

impl WindowSnapshot {
    pub fn from_gzip(gzip: Bytes) -> Self {
        Self { gzip }
    }

    pub fn gzip(&self) -> &Bytes {
        &self.gzip
    }

    pub fn into_gzip(self) -> Bytes {
        self.gzip
    }

    /// Plain JSON bytes for clients that do not accept gzip.
    pub fn json(&self) -> Result<Bytes, WindowError> {
        gunzip(&self.gzip)
            .map(Bytes::from)
            .map_err(|err| WindowError::Encode(err.to_string()))
    }

    pub fn window(&self) -> Result<TraceWindow, WindowError> {
        let json = self.json()?;
        serde_json::from_slice(&json).map_err(|err| WindowError::Encode(err.to_string()))
    }
}

#[derive(Clone)]
pub struct WindowService {
    repo: Arc<dyn TraceRepo>,
    cache: Option<Arc<SnapshotCache<WindowError>>>,
    limits: WindowLimits,
    ttl: Duration,
}

impl WindowService {
    /// `cache: None` serves every read straight from the repository.
    pub fn new(
        repo: Arc<dyn TraceRepo>,
        cache: Option<Arc<SnapshotCache<WindowError>>>,
        limits: WindowLimits,
        ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            limits,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn limits(&self) -> WindowLimits {
        self.limits
    }

    pub async fn snapshot(&self) -> Result<WindowSnapshot, WindowError> {
        let repo = Arc::clone(&self.repo);
        let limits = self.limits;
        let compute = move || build_snapshot(repo, limits);

        let bytes = match &self.cache {
            Some(cache) => cache.get_or_populate(WINDOW_KEY, self.ttl, compute).await?,
            None => compute().await?,
        };
        Ok(WindowSnapshot::from_gzip(bytes))
    }
}

async fn build_snapshot(repo: Arc<dyn TraceRepo>, limits: WindowLimits) -> Result<Bytes, WindowError> {
    let (objects, messages, phantoms) = tokio::try_join!(
        repo.latest_objects(limits.objects),
        repo.latest_messages(limits.messages),
        repo.latest_phantoms(limits.phantoms),
    )?;

    debug!(
        objects = objects.len(),
        messages = messages.len(),
        phantoms = phantoms.len(),
        "trace window assembled"
    );

    let window = TraceWindow {
        objects,
        messages,
        phantoms,
    };
    let json = serde_json::to_vec(&window).map_err(|err| WindowError::Encode(err.to_string()))?;
    gzip(&json).map_err(|err| WindowError::Encode(err.to_string()))
}
