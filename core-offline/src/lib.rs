//! # Offline Cache Core
//!
//! Bounded span cache eviction with pinned-content exemption, and
//! reconciliation of pinned songs into the cache.
//!
//! ## Components
//!
//! - [`ExemptionOracle`]: is a key pinned (downloaded playlist or favourite)?
//! - [`EvictionEngine`]: least-recently-touched eviction that skips pinned spans
//! - [`JobDispatcher`]: bounded worker pool over a fixed job list
//! - [`DownloadOrchestrator`]: queues downloads for pinned songs missing from the cache
//! - [`OfflineCache`]: wires all of the above from a [`CoreConfig`](core_runtime::config::CoreConfig)
//!
//! ## Usage
//!
//! ```ignore
//! use core_offline::{OfflineCache, OfflineConfig, ReconcileTrigger, SpanEvent};
//! use core_runtime::events::EventBus;
//!
//! let offline = OfflineCache::start(core_config, OfflineConfig::new(2 << 30), EventBus::default())?;
//!
//! // Cache store callbacks
//! offline.evictor().notify(SpanEvent::SpanAdded(span))?;
//!
//! // App start
//! offline.orchestrator().initialize().await?;
//! offline.orchestrator().reconcile(ReconcileTrigger::StartupRestart).await?;
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod evictor;
pub mod exemption;
pub mod orchestrator;
pub mod playback;

pub use config::{BudgetPolicy, OfflineConfig};
pub use context::OfflineCache;
pub use dispatch::{ClaimCursor, DispatchReport, ItemFailure, JobDispatcher};
pub use error::{OfflineError, Result};
pub use evictor::{EvictionEngine, EvictionReport, EvictorHandle, EvictorStats, SpanEvent};
pub use exemption::ExemptionOracle;
pub use orchestrator::{DownloadOrchestrator, PrecacheSummary, ReconcileSummary, ReconcileTrigger};
pub use playback::{PlaybackQuery, PlaybackRequest, QueuedItem};
