//! Process-wide wiring: pool, cache, and the services built on them.

use std::sync::Arc;

use tracing::info;

use crate::{
    application::{
        error::AppError,
        repos::TraceRepo,
        traces::TraceWriteService,
        window::{WindowLimits, WindowService},
    },
    cache::{CacheConfig, SnapshotCache, build_store},
    config::{CacheSettings, DatabaseSettings, Settings, WindowSettings},
    domain::traces::BundleLimits,
    infra::{db::PostgresRepositories, error::InfraError, http::HttpState},
};

/// The read and write services sharing one repository and one snapshot cache.
#[derive(Clone)]
pub struct TraceServices {
    pub repo: Arc<dyn TraceRepo>,
    pub window: Arc<WindowService>,
    pub traces: Arc<TraceWriteService>,
}

impl TraceServices {
    pub fn build(
        repo: Arc<dyn TraceRepo>,
        cache: &CacheSettings,
        window: &WindowSettings,
    ) -> Result<Self, InfraError> {
        let config = CacheConfig::from(cache);
        let snapshot_cache = if config.enabled {
            let store = build_store(&config)?;
            info!(
                backend = store.backend(),
                ttl_secs = config.max_age_secs(),
                "snapshot cache enabled"
            );
            Some(Arc::new(SnapshotCache::new(store)))
        } else {
            info!("snapshot cache disabled; reads go straight to the database");
            None
        };

        let limits = WindowLimits {
            objects: window.objects.get(),
            messages: window.messages.get(),
            phantoms: window.phantoms.get(),
        };
        let bundle_limits = BundleLimits {
            max_phantom_frames: window.max_phantom_frames.get(),
        };

        Ok(Self {
            window: Arc::new(WindowService::new(
                repo.clone(),
                snapshot_cache.clone(),
                limits,
                config.ttl,
            )),
            traces: Arc::new(TraceWriteService::new(
                repo.clone(),
                snapshot_cache,
                bundle_limits,
            )),
            repo,
        })
    }

    pub fn http_state(&self) -> HttpState {
        HttpState {
            window: self.window.clone(),
            traces: self.traces.clone(),
            repo: self.repo.clone(),
        }
    }
}

pub struct AppContext {
    db: Arc<PostgresRepositories>,
    services: TraceServices,
}

impl AppContext {
    /// Connect, migrate, and assemble the services for serving.
    pub async fn open(settings: &Settings) -> Result<Self, AppError> {
        let db = connect_database(&settings.database).await?;
        PostgresRepositories::run_migrations(db.pool())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

        let repo: Arc<dyn TraceRepo> = db.clone();
        let services = TraceServices::build(repo, &settings.cache, &settings.window)?;
        Ok(Self { db, services })
    }

    pub fn services(&self) -> &TraceServices {
        &self.services
    }

    pub fn database(&self) -> &PostgresRepositories {
        &self.db
    }

    pub async fn close(self) {
        self.db.close().await;
        info!("database pool closed");
    }
}

pub async fn connect_database(
    settings: &DatabaseSettings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let url = settings
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(
        url,
        settings.max_connections.get(),
        settings.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}
