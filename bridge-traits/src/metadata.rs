//! Song Metadata Store Contract
//!
//! The metadata store records which songs the user pinned (members of
//! playlists marked for download, favourited songs) and the stream format
//! last resolved for each song. The core only reads pin state and writes
//! format details back after resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A song that must stay cached, with its best-known content length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDownloadInfo {
    pub song_id: String,
    /// `None` when no format has been resolved for the song yet.
    pub content_length: Option<u64>,
}

impl SongDownloadInfo {
    pub fn new(song_id: impl Into<String>, content_length: Option<u64>) -> Self {
        Self {
            song_id: song_id.into(),
            content_length,
        }
    }
}

/// Stream format details persisted after a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRecord {
    pub song_id: String,
    pub itag: Option<i32>,
    pub mime_type: Option<String>,
    pub bitrate: Option<u64>,
    pub loudness_db: Option<f32>,
    pub content_length: Option<u64>,
    pub last_modified: Option<i64>,
}

/// Read/write access to song pin state and format metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Whether the song belongs to at least one playlist marked for download.
    async fn is_downloaded(&self, song_id: &str) -> Result<bool>;

    /// Whether the song is favourited.
    async fn is_favourited(&self, song_id: &str) -> Result<bool>;

    /// Songs in playlists marked for download, one row per song, annotated
    /// with the largest known content length.
    async fn pinned_playlist_items(&self) -> Result<Vec<SongDownloadInfo>>;

    /// Favourited songs with their known content length.
    async fn favourited_items(&self) -> Result<Vec<SongDownloadInfo>>;

    /// Insert or replace the stream format for a song.
    async fn record_format(&self, format: FormatRecord) -> Result<()>;

    /// Store the human-readable duration (e.g. `3:05`) for a song.
    async fn update_duration_text(&self, song_id: &str, text: &str) -> Result<()>;
}
