//! # Offline Cache Error Types
//!
//! Error kinds raised by eviction, dispatch and download reconciliation.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur in the offline cache core.
#[derive(Error, Debug)]
pub enum OfflineError {
    // ========================================================================
    // Per-item Outcomes
    // ========================================================================
    /// The content service could not produce a playable format.
    #[error("Resolution failed for {song_id}: {reason}")]
    ResolutionFailed { song_id: String, reason: String },

    /// The content service reported a non-OK playability status.
    #[error("Song {song_id} is unplayable (status {status})")]
    Unplayable { song_id: String, status: String },

    /// Writing fetched content into the cache failed.
    #[error("Cache write failed for {song_id}: {message}")]
    CacheWriteFailed { song_id: String, message: String },

    // ========================================================================
    // Steady States
    // ========================================================================
    /// The budget cannot be met because every remaining byte is pinned.
    #[error("Eviction exhausted: {exempt_bytes} pinned bytes over a {max_bytes} byte budget")]
    EvictionExhausted { exempt_bytes: u64, max_bytes: u64 },

    /// An in-flight download below the completion threshold was dropped.
    #[error("Partial download of {song_id} discarded at {percent_complete}%")]
    PartialDownloadDiscarded { song_id: String, percent_complete: u8 },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Offline configuration is invalid.
    #[error("Invalid offline configuration: {0}")]
    InvalidConfig(String),

    /// A host bridge call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Runtime error from core-runtime.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OfflineError {
    /// Returns `true` if the item is skipped silently until the next
    /// reconciliation.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            OfflineError::ResolutionFailed { .. } | OfflineError::Unplayable { .. }
        )
    }

    /// Returns `true` if this is an expected outcome rather than a failure.
    pub fn is_expected(&self) -> bool {
        self.is_skippable()
            || matches!(
                self,
                OfflineError::EvictionExhausted { .. }
                    | OfflineError::PartialDownloadDiscarded { .. }
            )
    }
}

/// Result type for offline cache operations.
pub type Result<T> = std::result::Result<T, OfflineError>;
