//! # Download Orchestrator
//!
//! Keeps pinned songs available offline.
//!
//! ## Overview
//!
//! A reconciliation pass compares the songs that must stay cached (songs in
//! playlists marked for download, plus favourites when the user keeps them
//! offline) against the cache, and queues a download for every gap:
//!
//! 1. Build the target set, keeping the largest known content length per song
//! 2. Drop songs already fully cached or already in flight
//! 3. Run one fetch job per remaining song through the [`JobDispatcher`]
//!
//! A fetch job resolves the song to a stream format, records the format,
//! back-fills the duration text when the playback queue lacks it, and submits
//! a download request keyed by the song id. Unplayable or unresolvable songs
//! are skipped until the next pass.
//!
//! At startup the pass runs inside a pause/resume of the download manager and
//! first discards in-flight downloads below the completion threshold, since a
//! half-fetched stream URL may have expired.
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = DownloadOrchestrator::new(&core_config, offline_config, event_bus)?;
//! orchestrator.initialize().await?;
//! orchestrator.reconcile(ReconcileTrigger::StartupRestart).await?;
//! ```

use crate::config::OfflineConfig;
use crate::dispatch::{DispatchReport, JobDispatcher};
use crate::error::{OfflineError, Result};
use crate::exemption::ExemptionOracle;
use crate::playback::{format_duration_text, PlaybackQuery};
use bridge_traits::{
    CacheWriter, ContentResolver, DownloadManager, DownloadRequest, DownloadState, FormatRecord,
    MetadataStore, SongDownloadInfo, SpanCache, StreamFormat,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Why a reconciliation pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileTrigger {
    PlaylistDownloadsChanged,
    FavouritesDownloadsChanged,
    StartupRestart,
}

impl ReconcileTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlaylistDownloadsChanged => "playlist_downloads_changed",
            Self::FavouritesDownloadsChanged => "favourites_downloads_changed",
            Self::StartupRestart => "startup_restart",
        }
    }
}

impl fmt::Display for ReconcileTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub run_id: Uuid,
    pub trigger: ReconcileTrigger,
    /// Songs in the target set
    pub targets: usize,
    pub already_cached: usize,
    pub already_in_flight: usize,
    pub queued: usize,
    /// Unplayable or unresolvable songs
    pub skipped: usize,
    pub failed: usize,
    /// Partial downloads dropped before the pass (restart only)
    pub discarded: Vec<String>,
}

/// Counts from one direct pre-cache run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-song fetch logic shared by every dispatch worker.
#[derive(Clone)]
struct FetchContext {
    metadata: Arc<dyn MetadataStore>,
    resolver: Arc<dyn ContentResolver>,
    downloads: Arc<dyn DownloadManager>,
    playback: PlaybackQuery,
    events: EventBus,
}

impl FetchContext {
    /// Resolve `song_id` to its chosen format and stream URL.
    async fn resolve(&self, song_id: &str) -> Result<(StreamFormat, String)> {
        let result = self
            .resolver
            .resolve(song_id)
            .await
            .map_err(|e| OfflineError::ResolutionFailed {
                song_id: song_id.to_string(),
                reason: e.to_string(),
            })?;

        if !result.status.is_ok() {
            return Err(OfflineError::Unplayable {
                song_id: song_id.to_string(),
                status: result.status.as_str().to_string(),
            });
        }

        let format = result
            .chosen_format
            .ok_or_else(|| OfflineError::ResolutionFailed {
                song_id: song_id.to_string(),
                reason: "no playable format".to_string(),
            })?;

        let url = format
            .url
            .clone()
            .ok_or_else(|| OfflineError::ResolutionFailed {
                song_id: song_id.to_string(),
                reason: "format has no stream url".to_string(),
            })?;

        Ok((format, url))
    }

    /// Resolve, back-fill duration and record the format. Returns the stream URL.
    async fn prepare(&self, song_id: &str) -> Result<String> {
        let (format, url) = self.resolve(song_id).await?;

        self.backfill_duration(song_id, &format).await;

        self.metadata
            .record_format(FormatRecord {
                song_id: song_id.to_string(),
                itag: format.itag,
                mime_type: format.mime_type.clone(),
                bitrate: format.bitrate,
                loudness_db: format.loudness_db,
                content_length: format.content_length,
                last_modified: format.last_modified,
            })
            .await?;

        Ok(url)
    }

    async fn backfill_duration(&self, song_id: &str, format: &StreamFormat) {
        let Some(duration_ms) = format.approx_duration_ms else {
            return;
        };

        let queued = self.playback.find_queued_item(song_id).await;
        if queued
            .as_ref()
            .is_some_and(|item| item.duration_text.is_some())
        {
            return;
        }

        let text = format_duration_text(duration_ms / 1000);
        if queued.is_some() {
            self.playback.set_duration_text(song_id, &text).await;
        }

        if let Err(e) = self.metadata.update_duration_text(song_id, &text).await {
            warn!(song_id, error = %e, "Failed to store duration text");
        }
    }

    #[instrument(skip(self))]
    async fn download_song(&self, song_id: &str) -> Result<()> {
        let url = self.prepare(song_id).await?;

        self.downloads
            .submit(DownloadRequest::for_song(song_id, url))
            .await?;
        self.downloads.resume().await?;

        debug!("Queued download");
        let _ = self.events.emit(CoreEvent::Download(DownloadEvent::ItemQueued {
            song_id: song_id.to_string(),
        }));
        Ok(())
    }
}

/// Reconciles pinned songs against the cache.
pub struct DownloadOrchestrator {
    fetch: Arc<FetchContext>,
    cache: Arc<dyn SpanCache>,
    writer: Option<Arc<dyn CacheWriter>>,
    oracle: ExemptionOracle,
    dispatcher: JobDispatcher,
    config: OfflineConfig,
    submission_gate: tokio::sync::Mutex<()>,
}

impl DownloadOrchestrator {
    /// # Errors
    ///
    /// Returns [`OfflineError::InvalidConfig`] if `config` does not validate.
    pub fn new(core: &CoreConfig, config: OfflineConfig, events: EventBus) -> Result<Self> {
        config.validate()?;

        let fetch = FetchContext {
            metadata: Arc::clone(&core.metadata_store),
            resolver: Arc::clone(&core.content_resolver),
            downloads: Arc::clone(&core.download_manager),
            playback: PlaybackQuery::detached(),
            events,
        };

        Ok(Self {
            fetch: Arc::new(fetch),
            cache: Arc::clone(&core.span_cache),
            writer: core.cache_writer.clone(),
            oracle: ExemptionOracle::new(
                Arc::clone(&core.metadata_store),
                Arc::clone(&core.settings_store),
            ),
            dispatcher: JobDispatcher::new(config.dispatch_pool_size)?,
            config,
            submission_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Route duration lookups to the playback state owner.
    ///
    /// Workers still running from an abandoned pass keep their old context.
    pub fn with_playback_query(mut self, playback: PlaybackQuery) -> Self {
        let mut fetch = FetchContext::clone(&self.fetch);
        fetch.playback = playback;
        self.fetch = Arc::new(fetch);
        self
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Push the parallel download cap to the download manager and resume its queue.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let downloads = &self.fetch.downloads;
        downloads
            .set_max_parallel_downloads(self.config.max_parallel_downloads)
            .await?;
        downloads.resume().await?;
        info!(
            max_parallel_downloads = self.config.max_parallel_downloads,
            "Download manager initialized"
        );
        Ok(())
    }

    /// Run one reconciliation pass.
    ///
    /// Passes are serialized: a pass never races another pass's pause or
    /// submissions.
    #[instrument(skip(self, trigger), fields(trigger = %trigger))]
    pub async fn reconcile(&self, trigger: ReconcileTrigger) -> Result<ReconcileSummary> {
        let _gate = self.submission_gate.lock().await;
        let run_id = Uuid::new_v4();

        self.emit(DownloadEvent::ReconcileStarted {
            run_id,
            trigger: trigger.as_str().to_string(),
        });

        let summary = if trigger == ReconcileTrigger::StartupRestart {
            let downloads = &self.fetch.downloads;
            downloads.pause().await?;

            let outcome = match self.discard_partial_downloads().await {
                Ok(discarded) => self
                    .reconcile_targets(run_id, trigger)
                    .await
                    .map(|summary| ReconcileSummary {
                        discarded,
                        ..summary
                    }),
                Err(e) => Err(e),
            };

            match (outcome, downloads.resume().await) {
                (Ok(summary), resumed) => {
                    resumed?;
                    summary
                }
                (Err(e), resumed) => {
                    if let Err(resume_error) = resumed {
                        warn!(error = %resume_error, "Failed to resume downloads after restart");
                    }
                    return Err(e);
                }
            }
        } else {
            self.reconcile_targets(run_id, trigger).await?
        };

        info!(
            targets = summary.targets,
            already_cached = summary.already_cached,
            already_in_flight = summary.already_in_flight,
            queued = summary.queued,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation complete"
        );
        self.emit(DownloadEvent::ReconcileCompleted {
            run_id,
            targets: summary.targets,
            already_cached: summary.already_cached,
            queued: summary.queued,
            skipped: summary.skipped,
            failed: summary.failed,
        });

        Ok(summary)
    }

    /// Remove in-flight downloads below the completion threshold.
    async fn discard_partial_downloads(&self) -> Result<Vec<String>> {
        let threshold = f32::from(self.config.partial_download_threshold_percent);
        let mut discarded = Vec::new();

        for download in self.fetch.downloads.in_flight().await? {
            if download.percent_complete >= threshold {
                continue;
            }

            self.fetch.downloads.remove(&download.id).await?;

            let percent_complete = download.percent_complete.clamp(0.0, 100.0) as u8;
            let outcome = OfflineError::PartialDownloadDiscarded {
                song_id: download.id.clone(),
                percent_complete,
            };
            info!("{}", outcome);
            self.emit(DownloadEvent::PartialDownloadDiscarded {
                song_id: download.id.clone(),
                percent_complete,
            });
            discarded.push(download.id);
        }

        Ok(discarded)
    }

    /// Songs that must stay cached, in first-seen order.
    ///
    /// A song listed by both sources keeps the larger known content length.
    pub async fn target_set(&self) -> Result<Vec<SongDownloadInfo>> {
        let mut targets = self.fetch.metadata.pinned_playlist_items().await?;

        if self.oracle.download_favourites_enabled().await? {
            targets.extend(self.fetch.metadata.favourited_items().await?);
        }

        Ok(merge_targets(targets))
    }

    async fn reconcile_targets(
        &self,
        run_id: Uuid,
        trigger: ReconcileTrigger,
    ) -> Result<ReconcileSummary> {
        let targets = self.target_set().await?;
        let in_flight: HashSet<String> = self
            .fetch
            .downloads
            .in_flight()
            .await?
            .into_iter()
            .map(|download| download.id)
            .collect();

        let mut summary = ReconcileSummary {
            run_id,
            trigger,
            targets: targets.len(),
            already_cached: 0,
            already_in_flight: 0,
            queued: 0,
            skipped: 0,
            failed: 0,
            discarded: Vec::new(),
        };

        let mut pending = Vec::new();
        for target in targets {
            if in_flight.contains(&target.song_id) {
                summary.already_in_flight += 1;
                continue;
            }
            if self.is_fully_cached(&target).await {
                summary.already_cached += 1;
                continue;
            }
            pending.push(target.song_id);
        }

        let fetch = Arc::clone(&self.fetch);
        let report = self
            .dispatcher
            .run(pending.clone(), move |song_id: String| {
                let fetch = Arc::clone(&fetch);
                async move { fetch.download_song(&song_id).await }
            })
            .await?;

        let (skipped, failed) = self.publish_failures(&pending, &report);
        summary.skipped = skipped;
        summary.failed = failed;
        summary.queued = report.succeeded();
        Ok(summary)
    }

    async fn is_fully_cached(&self, target: &SongDownloadInfo) -> bool {
        let Some(length) = target.content_length else {
            return false;
        };

        match self.cache.is_cached(&target.song_id, 0, length).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(
                    song_id = %target.song_id,
                    error = %e,
                    "Cache lookup failed, fetching anyway"
                );
                false
            }
        }
    }

    /// Emit per-song events for failed jobs. Returns `(skipped, failed)`.
    fn publish_failures(&self, song_ids: &[String], report: &DispatchReport) -> (usize, usize) {
        let mut skipped = 0;
        let mut failed = 0;

        for failure in &report.failures {
            let song_id = song_ids
                .get(failure.index)
                .cloned()
                .unwrap_or_default();

            if failure.error.is_skippable() {
                skipped += 1;
                self.emit(DownloadEvent::ItemSkipped {
                    song_id,
                    reason: failure.error.to_string(),
                });
            } else {
                failed += 1;
                self.emit(DownloadEvent::ItemFailed {
                    song_id,
                    message: failure.error.to_string(),
                });
            }
        }

        (skipped, failed)
    }

    /// Fetch `song_ids` straight into the cache through the [`CacheWriter`].
    ///
    /// Bypasses the download manager. A failed write only fails that song.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineError::Runtime`] if no cache writer was configured.
    #[instrument(skip(self, song_ids), fields(songs = song_ids.len()))]
    pub async fn precache(&self, song_ids: Vec<String>) -> Result<PrecacheSummary> {
        let writer = self.writer.clone().ok_or_else(|| {
            core_runtime::Error::capability_missing(
                "CacheWriter",
                "No cache writer provided. Direct pre-caching is unavailable.",
            )
        })?;

        let remaining = Arc::new(AtomicUsize::new(song_ids.len()));
        self.emit(DownloadEvent::PrecacheProgress {
            remaining: song_ids.len(),
        });

        let fetch = Arc::clone(&self.fetch);
        let report = self
            .dispatcher
            .run(song_ids.clone(), move |song_id: String| {
                let fetch = Arc::clone(&fetch);
                let writer = Arc::clone(&writer);
                let remaining = Arc::clone(&remaining);
                async move {
                    let outcome = write_song(&fetch, writer.as_ref(), &song_id).await;
                    let left = remaining.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
                    let _ = fetch.events.emit(CoreEvent::Download(DownloadEvent::PrecacheProgress {
                        remaining: left,
                    }));
                    outcome
                }
            })
            .await?;

        let (skipped, failed) = self.publish_failures(&song_ids, &report);
        Ok(PrecacheSummary {
            written: report.succeeded(),
            skipped,
            failed,
        })
    }

    /// Translate a download manager callback into events.
    pub fn on_download_changed(&self, song_id: &str, state: DownloadState, remaining: usize) {
        debug!(song_id, state = state.as_str(), remaining, "Download changed");

        self.emit(DownloadEvent::StateChanged {
            song_id: song_id.to_string(),
            state: state.as_str().to_string(),
            remaining,
        });

        if remaining == 0 {
            info!("Download queue drained");
            self.emit(DownloadEvent::QueueDrained);
        }
    }

    fn emit(&self, event: DownloadEvent) {
        let _ = self.fetch.events.emit(CoreEvent::Download(event));
    }
}

impl fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("has_cache_writer", &self.writer.is_some())
            .finish()
    }
}

#[instrument(skip(fetch, writer))]
async fn write_song(fetch: &FetchContext, writer: &dyn CacheWriter, song_id: &str) -> Result<()> {
    let url = fetch.prepare(song_id).await?;

    let bytes = writer
        .write(song_id, &url)
        .await
        .map_err(|e| OfflineError::CacheWriteFailed {
            song_id: song_id.to_string(),
            message: e.to_string(),
        })?;

    debug!(bytes, "Pre-cached song");
    Ok(())
}

/// Union by song id, keeping the larger known content length.
fn merge_targets(items: Vec<SongDownloadInfo>) -> Vec<SongDownloadInfo> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<SongDownloadInfo> = Vec::with_capacity(items.len());

    for item in items {
        match positions.get(&item.song_id) {
            Some(&at) => {
                let existing = &mut merged[at];
                existing.content_length = match (existing.content_length, item.content_length) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            None => {
                positions.insert(item.song_id.clone(), merged.len());
                merged.push(item);
            }
        }
    }

    merged
}
