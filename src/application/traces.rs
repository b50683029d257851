//! Write path: record one trace bundle and retire the cached window.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{InsertedBundle, RepoError, TraceRepo};
use crate::application::window::WindowError;
use crate::cache::{SnapshotCache, WINDOW_KEY};
use crate::domain::error::DomainError;
use crate::domain::traces::{BundleLimits, TraceBundleDraft};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct TraceWriteService {
    repo: Arc<dyn TraceRepo>,
    cache: Option<Arc<SnapshotCache<WindowError>>>,
    limits: BundleLimits,
}

impl TraceWriteService {
    pub fn new(
        repo: Arc<dyn TraceRepo>,
        cache: Option<Arc<SnapshotCache<WindowError>>>,
        limits: BundleLimits,
    ) -> Self {
        Self {
            repo,
            cache,
            limits,
        }
    }

    /// Validate and persist `draft` atomically, then invalidate the window.
    ///
    /// The window is not repopulated here; the next reader does that.
    pub async fn record(&self, draft: TraceBundleDraft) -> Result<InsertedBundle, WriteError> {
        let bundle = draft.validate(&self.limits)?;
        let inserted = self.repo.insert_bundle(&bundle).await?;

        counter!("vestige_trace_bundles_total").increment(1);
        info!(
            owner = %bundle.phantom.u_uuid,
            object_id = ?inserted.object_id,
            message_id = ?inserted.message_id,
            phantom_id = inserted.phantom_id,
            frames = bundle.phantom.data.len(),
            "trace bundle recorded"
        );

        if let Some(cache) = &self.cache
            && let Err(err) = cache.invalidate(WINDOW_KEY).await
        {
            warn!(
                key = WINDOW_KEY,
                error = %err,
                "window invalidation failed; readers may see the previous window until it expires"
            );
        }

        Ok(inserted)
    }
}
