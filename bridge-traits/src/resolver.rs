//! Content Resolution Contract
//!
//! Turns a song identifier into a streamable URL plus format details. The
//! wire protocol behind it is opaque to the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Playability verdict reported by the resolution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayabilityStatus {
    Ok,
    /// Any non-OK status, carrying the raw status string (e.g. `LOGIN_REQUIRED`).
    Other(String),
}

impl PlayabilityStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PlayabilityStatus::Ok)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlayabilityStatus::Ok => "OK",
            PlayabilityStatus::Other(status) => status,
        }
    }
}

/// The format chosen for download (highest quality audio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub url: Option<String>,
    pub itag: Option<i32>,
    pub mime_type: Option<String>,
    pub bitrate: Option<u64>,
    pub approx_duration_ms: Option<u64>,
    pub loudness_db: Option<f32>,
    pub content_length: Option<u64>,
    pub last_modified: Option<i64>,
}

/// Result of resolving one song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayabilityResult {
    pub status: PlayabilityStatus,
    pub chosen_format: Option<StreamFormat>,
}

/// Remote service resolving songs to playable formats.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, song_id: &str) -> Result<PlayabilityResult>;
}
