//! Dependency initialization and wiring for the circle indexer.

use std::sync::Arc;

use circle_indexer_state::CircleCache;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::consumer::MirrorNodeSource;
use crate::loader::CircleLoader;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::processor::MessageProcessor;
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Circle cache shared with readers.
    pub cache: Arc<CircleCache>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`SyncConfig::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If a mirror URL is unusable
    pub fn new() -> Result<Self, IndexingError> {
        Self::from_config(SyncConfig::from_env())
    }

    /// Wire dependencies from already-parsed settings.
    pub fn from_config(config: SyncConfig) -> Result<Self, IndexingError> {
        info!(
            mirror_rest_url = %config.mirror_rest_url,
            mirror_ws_url = %config.mirror_ws_url,
            topics = ?config.topics.iter().map(|t| format!("{}={}", t.kind, t.id)).collect::<Vec<_>>(),
            backfill_page_size = config.backfill_page_size,
            backfill_max_retries = config.backfill_max_retries,
            reconnect_initial_ms = config.reconnect.initial.as_millis() as u64,
            reconnect_max_ms = config.reconnect.max.as_millis() as u64,
            "Initializing dependencies"
        );

        if config.topics.is_empty() {
            warn!("No valid topic ids configured, the indexer will have nothing to sync");
        }

        let source = MirrorNodeSource::from_urls(
            &config.mirror_rest_url,
            &config.mirror_ws_url,
            config.backfill_page_size,
            config.rest_timeout,
            config.reconnect,
        )
        .map_err(|e| IndexingError::config(format!("Failed to create mirror client: {}", e)))?;

        info!("Mirror node client created");

        let cache = Arc::new(CircleCache::new());
        let processor = MessageProcessor::new();
        let loader = CircleLoader::new(Arc::clone(&cache));

        let orchestrator = Orchestrator::with_config(
            Arc::new(source),
            config.topics.clone(),
            processor,
            loader,
            OrchestratorConfig::from(&config),
        );

        Ok(Self {
            orchestrator,
            cache,
        })
    }
}
