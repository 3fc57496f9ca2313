//! In-memory host bridges shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CacheSpan, CacheWriter, ContentResolver, DownloadManager, DownloadRequest,
    FormatRecord, InFlightDownload, InMemorySettingsStore, MetadataStore, PlayabilityResult,
    PlayabilityStatus, SettingsStore, SongDownloadInfo, SpanCache, StreamFormat,
};
use core_offline::{EvictorHandle, SpanEvent};
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// =============================================================================
// Metadata
// =============================================================================

#[derive(Default)]
pub struct FakeMetadata {
    pub downloaded: Mutex<HashSet<String>>,
    pub favourited: Mutex<HashSet<String>>,
    pub playlist_items: Mutex<Vec<SongDownloadInfo>>,
    pub favourite_items: Mutex<Vec<SongDownloadInfo>>,
    pub formats: Mutex<Vec<FormatRecord>>,
    pub duration_texts: Mutex<HashMap<String, String>>,
}

impl FakeMetadata {
    pub fn pin(&self, song_id: &str) {
        self.downloaded.lock().insert(song_id.to_string());
    }

    pub fn unpin(&self, song_id: &str) {
        self.downloaded.lock().remove(song_id);
    }

    pub fn add_playlist_item(&self, song_id: &str, content_length: Option<u64>) {
        self.pin(song_id);
        self.playlist_items
            .lock()
            .push(SongDownloadInfo::new(song_id, content_length));
    }

    pub fn add_favourite(&self, song_id: &str, content_length: Option<u64>) {
        self.favourited.lock().insert(song_id.to_string());
        self.favourite_items
            .lock()
            .push(SongDownloadInfo::new(song_id, content_length));
    }
}

#[async_trait]
impl MetadataStore for FakeMetadata {
    async fn is_downloaded(&self, song_id: &str) -> BridgeResult<bool> {
        Ok(self.downloaded.lock().contains(song_id))
    }

    async fn is_favourited(&self, song_id: &str) -> BridgeResult<bool> {
        Ok(self.favourited.lock().contains(song_id))
    }

    async fn pinned_playlist_items(&self) -> BridgeResult<Vec<SongDownloadInfo>> {
        Ok(self.playlist_items.lock().clone())
    }

    async fn favourited_items(&self) -> BridgeResult<Vec<SongDownloadInfo>> {
        Ok(self.favourite_items.lock().clone())
    }

    async fn record_format(&self, format: FormatRecord) -> BridgeResult<()> {
        self.formats.lock().push(format);
        Ok(())
    }

    async fn update_duration_text(&self, song_id: &str, text: &str) -> BridgeResult<()> {
        self.duration_texts
            .lock()
            .insert(song_id.to_string(), text.to_string());
        Ok(())
    }
}

// =============================================================================
// Span store
// =============================================================================

/// Span store that reports deletions back to the evictor, like a real cache.
#[derive(Default)]
pub struct FakeSpanStore {
    spans: Mutex<HashMap<(String, u64), CacheSpan>>,
    pub removed: Mutex<Vec<String>>,
    evictor: Mutex<Option<EvictorHandle>>,
    pub read_only: Mutex<bool>,
}

impl FakeSpanStore {
    pub fn attach(&self, evictor: EvictorHandle) {
        *self.evictor.lock() = Some(evictor);
    }

    pub fn insert(&self, span: CacheSpan) {
        self.spans
            .lock()
            .insert((span.key.clone(), span.position), span);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.spans.lock().keys().any(|(k, _)| k == key)
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

#[async_trait]
impl SpanCache for FakeSpanStore {
    async fn remove_span(&self, span: &CacheSpan) -> BridgeResult<()> {
        if *self.read_only.lock() {
            return Err(BridgeError::OperationFailed("store is read-only".to_string()));
        }

        let removed = self.spans.lock().remove(&(span.key.clone(), span.position));
        let Some(removed) = removed else {
            return Err(BridgeError::SpanNotFound {
                key: span.key.clone(),
                position: span.position,
            });
        };

        self.removed.lock().push(removed.key.clone());
        let evictor = self.evictor.lock().clone();
        if let Some(evictor) = evictor {
            evictor.notify(SpanEvent::SpanRemoved(removed)).ok();
        }
        Ok(())
    }

    async fn is_cached(&self, key: &str, position: u64, length: u64) -> BridgeResult<bool> {
        let spans = self.spans.lock();
        let covered: u64 = spans
            .values()
            .filter(|s| s.key == key && s.position >= position)
            .map(|s| s.length)
            .sum();
        Ok(covered >= length)
    }
}

// =============================================================================
// Resolver
// =============================================================================

#[derive(Default)]
pub struct FakeResolver {
    overrides: Mutex<HashMap<String, PlayabilityResult>>,
    failures: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn playable_format(song_id: &str) -> StreamFormat {
        StreamFormat {
            url: Some(format!("https://media.test/{}", song_id)),
            itag: Some(251),
            mime_type: Some("audio/webm; codecs=\"opus\"".to_string()),
            bitrate: Some(160_000),
            approx_duration_ms: Some(185_000),
            loudness_db: Some(-7.5),
            content_length: Some(12345),
            last_modified: Some(1_700_000_000_000),
        }
    }

    pub fn set_status(&self, song_id: &str, status: &str) {
        self.overrides.lock().insert(
            song_id.to_string(),
            PlayabilityResult {
                status: PlayabilityStatus::Other(status.to_string()),
                chosen_format: None,
            },
        );
    }

    pub fn set_no_format(&self, song_id: &str) {
        self.overrides.lock().insert(
            song_id.to_string(),
            PlayabilityResult {
                status: PlayabilityStatus::Ok,
                chosen_format: None,
            },
        );
    }

    pub fn fail(&self, song_id: &str) {
        self.failures.lock().insert(song_id.to_string());
    }

    /// The next resolution of `song_id` never completes.
    pub fn stall_once(&self, song_id: &str) {
        self.stalled.lock().insert(song_id.to_string());
    }
}

#[async_trait]
impl ContentResolver for FakeResolver {
    async fn resolve(&self, song_id: &str) -> BridgeResult<PlayabilityResult> {
        self.calls.lock().push(song_id.to_string());

        let stalled = self.stalled.lock().remove(song_id);
        if stalled {
            std::future::pending::<()>().await;
        }

        if self.failures.lock().contains(song_id) {
            return Err(BridgeError::Network("connection reset".to_string()));
        }

        if let Some(result) = self.overrides.lock().get(song_id) {
            return Ok(result.clone());
        }

        Ok(PlayabilityResult {
            status: PlayabilityStatus::Ok,
            chosen_format: Some(Self::playable_format(song_id)),
        })
    }
}

// =============================================================================
// Download manager
// =============================================================================

/// Download queue that de-duplicates by id and logs every call in order.
#[derive(Default)]
pub struct FakeDownloads {
    pub in_flight: Mutex<Vec<InFlightDownload>>,
    pub submitted: Mutex<Vec<DownloadRequest>>,
    pub log: Mutex<Vec<String>>,
    pub max_parallel: Mutex<Option<usize>>,
}

impl FakeDownloads {
    pub fn start(&self, id: &str, percent_complete: f32) {
        self.in_flight.lock().push(InFlightDownload {
            id: id.to_string(),
            percent_complete,
        });
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted.lock().iter().map(|r| r.id.clone()).collect()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl DownloadManager for FakeDownloads {
    async fn submit(&self, request: DownloadRequest) -> BridgeResult<()> {
        self.log.lock().push(format!("submit:{}", request.id));
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.iter().any(|d| d.id == request.id) {
                in_flight.push(InFlightDownload {
                    id: request.id.clone(),
                    percent_complete: 0.0,
                });
            }
        }
        self.submitted.lock().push(request);
        Ok(())
    }

    async fn resume(&self) -> BridgeResult<()> {
        self.log.lock().push("resume".to_string());
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.log.lock().push("pause".to_string());
        Ok(())
    }

    async fn in_flight(&self) -> BridgeResult<Vec<InFlightDownload>> {
        Ok(self.in_flight.lock().clone())
    }

    async fn remove(&self, id: &str) -> BridgeResult<()> {
        self.log.lock().push(format!("remove:{}", id));
        self.in_flight.lock().retain(|d| d.id != id);
        Ok(())
    }

    async fn set_max_parallel_downloads(&self, max: usize) -> BridgeResult<()> {
        *self.max_parallel.lock() = Some(max);
        Ok(())
    }
}

// =============================================================================
// Cache writer
// =============================================================================

#[derive(Default)]
pub struct FakeWriter {
    pub written: Mutex<Vec<(String, String)>>,
    pub full: Mutex<HashSet<String>>,
}

#[async_trait]
impl CacheWriter for FakeWriter {
    async fn write(&self, cache_key: &str, uri: &str) -> BridgeResult<u64> {
        if self.full.lock().contains(cache_key) {
            return Err(BridgeError::OperationFailed("no space left".to_string()));
        }
        self.written
            .lock()
            .push((cache_key.to_string(), uri.to_string()));
        Ok(12345)
    }
}

// =============================================================================
// Host
// =============================================================================

pub struct Host {
    pub metadata: Arc<FakeMetadata>,
    pub store: Arc<FakeSpanStore>,
    pub resolver: Arc<FakeResolver>,
    pub downloads: Arc<FakeDownloads>,
    pub writer: Arc<FakeWriter>,
    pub settings: Arc<InMemorySettingsStore>,
}

impl Host {
    pub fn new() -> Self {
        Self {
            metadata: Arc::new(FakeMetadata::default()),
            store: Arc::new(FakeSpanStore::default()),
            resolver: Arc::new(FakeResolver::default()),
            downloads: Arc::new(FakeDownloads::default()),
            writer: Arc::new(FakeWriter::default()),
            settings: Arc::new(InMemorySettingsStore::new()),
        }
    }

    pub async fn keep_favourites_offline(&self, enabled: bool) {
        self.settings
            .set_bool(core_offline::config::DOWNLOAD_FAVOURITES_KEY, enabled)
            .await
            .unwrap();
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig::builder()
            .span_cache(self.store.clone())
            .metadata_store(self.metadata.clone())
            .content_resolver(self.resolver.clone())
            .download_manager(self.downloads.clone())
            .settings_store(self.settings.clone())
            .cache_writer(self.writer.clone())
            .build()
            .unwrap()
    }

    /// Same as [`Host::core_config`] without a cache writer.
    pub fn core_config_without_writer(&self) -> CoreConfig {
        CoreConfig::builder()
            .span_cache(self.store.clone())
            .metadata_store(self.metadata.clone())
            .content_resolver(self.resolver.clone())
            .download_manager(self.downloads.clone())
            .settings_store(self.settings.clone())
            .build()
            .unwrap()
    }
}
