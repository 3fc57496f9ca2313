//! Download Manager Contract
//!
//! The host download manager fetches requests in the background and writes
//! them into the shared span cache. It de-duplicates requests by id: adding
//! a request whose id is already queued replaces it instead of fetching twice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A request to fetch `uri` into the cache under `custom_cache_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub id: String,
    pub uri: String,
    pub custom_cache_key: String,
}

impl DownloadRequest {
    /// Build a request keyed (and cached) by the song id.
    pub fn for_song(song_id: impl Into<String>, uri: impl Into<String>) -> Self {
        let id = song_id.into();
        Self {
            custom_cache_key: id.clone(),
            id,
            uri: uri.into(),
        }
    }
}

/// A download the manager is currently working on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InFlightDownload {
    pub id: String,
    /// Progress in `0.0..=100.0`.
    pub percent_complete: f32,
}

/// State transitions reported by the download manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Queued,
    Downloading,
    Completed,
    Failed,
    Removing,
    Stopped,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Queued => "queued",
            DownloadState::Downloading => "downloading",
            DownloadState::Completed => "completed",
            DownloadState::Failed => "failed",
            DownloadState::Removing => "removing",
            DownloadState::Stopped => "stopped",
        }
    }
}

/// Background download queue owned by the host.
#[async_trait]
pub trait DownloadManager: Send + Sync {
    /// Queue a request. Re-submitting an id already known replaces it.
    async fn submit(&self, request: DownloadRequest) -> Result<()>;

    /// Resume processing the queue.
    async fn resume(&self) -> Result<()>;

    /// Pause all downloads.
    async fn pause(&self) -> Result<()>;

    /// Downloads that are queued or running.
    async fn in_flight(&self) -> Result<Vec<InFlightDownload>>;

    /// Remove a download and discard its partially written data.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Cap the number of downloads running at once.
    async fn set_max_parallel_downloads(&self, max: usize) -> Result<()>;
}
