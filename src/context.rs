use std::sync::Arc;

use tracing::info;

use crate::api::health::HealthState;
use crate::config::Config;
use crate::db::{DrawRepository, MemoryRepository, SqliteRepository};
use crate::error::Result;
use crate::notifier::UpdateNotifier;
use crate::sync::{Reconciler, SyncPipeline, UpdatePolicy};

/// Everything the service shares between the scheduler and the HTTP API.
pub struct AppContext {
    pub config: Config,
    pub repo: Arc<dyn DrawRepository>,
    pub notifier: Arc<UpdateNotifier>,
    pub health: Arc<HealthState>,
    pub pipeline: Arc<SyncPipeline>,
}

impl AppContext {
    /// Open the configured repository (`DB_PATH=:memory:` keeps everything in process).
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let repo: Arc<dyn DrawRepository> = if config.db_path == ":memory:" {
            info!("Using in-memory repository; nothing will be persisted");
            Arc::new(MemoryRepository::new())
        } else {
            Arc::new(SqliteRepository::connect(&config.db_path).await?)
        };
        Self::with_repository(config, repo)
    }

    pub fn with_repository(config: Config, repo: Arc<dyn DrawRepository>) -> Result<Arc<Self>> {
        let notifier = Arc::new(UpdateNotifier::new());
        let health = Arc::new(HealthState::new());
        let reconciler = Reconciler::from_config(&config, Arc::clone(&repo))?;
        let pipeline = Arc::new(SyncPipeline::new(
            reconciler,
            Arc::clone(&repo),
            Arc::clone(&notifier),
            Arc::clone(&health),
            UpdatePolicy::new(config.update_min_interval),
            config.sync_interval,
        ));
        Ok(Arc::new(Self { config, repo, notifier, health, pipeline }))
    }
}
