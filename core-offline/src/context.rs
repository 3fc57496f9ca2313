//! Offline cache context
//!
//! Builds the evictor and the orchestrator from one [`CoreConfig`] so both
//! share the same bridges, exemption rules and event bus.

use crate::config::OfflineConfig;
use crate::error::Result;
use crate::evictor::{EvictionEngine, EvictorHandle, EvictorStats};
use crate::exemption::ExemptionOracle;
use crate::orchestrator::DownloadOrchestrator;
use crate::playback::{PlaybackQuery, PlaybackRequest};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Explicitly constructed handle to the running offline cache core.
#[derive(Debug)]
pub struct OfflineCache {
    engine: Arc<EvictionEngine>,
    evictor: EvictorHandle,
    orchestrator: DownloadOrchestrator,
    events: EventBus,
}

impl OfflineCache {
    /// Validate `config` and start the evictor's event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(core: CoreConfig, config: OfflineConfig, events: EventBus) -> Result<Self> {
        config.validate()?;

        let oracle = ExemptionOracle::new(
            Arc::clone(&core.metadata_store),
            Arc::clone(&core.settings_store),
        );
        let engine = Arc::new(EvictionEngine::new(
            &config,
            oracle,
            Arc::clone(&core.span_cache),
            events.clone(),
        ));
        let evictor = Arc::clone(&engine).spawn();

        info!(
            max_cache_bytes = config.max_cache_bytes,
            budget_policy = config.budget_policy.description(),
            "Offline cache started"
        );

        let orchestrator = DownloadOrchestrator::new(&core, config, events.clone())?;

        Ok(Self {
            engine,
            evictor,
            orchestrator,
            events,
        })
    }

    /// Route duration lookups to the playback state owner.
    pub fn with_playback_query(mut self, playback: PlaybackQuery) -> Self {
        self.orchestrator = self.orchestrator.with_playback_query(playback);
        self
    }

    /// Open the playback state channel, bounded by the configured query timeout.
    ///
    /// The returned receiver must be drained by the component owning playback state.
    pub fn connect_playback(mut self, capacity: usize) -> (Self, mpsc::Receiver<PlaybackRequest>) {
        let timeout = self.orchestrator.config().playback_query_timeout;
        let (query, requests) = PlaybackQuery::channel(capacity, timeout);
        self.orchestrator = self.orchestrator.with_playback_query(query);
        (self, requests)
    }

    /// Handle the cache store delivers span events to.
    pub fn evictor(&self) -> &EvictorHandle {
        &self.evictor
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn stats(&self) -> EvictorStats {
        self.engine.stats()
    }
}
