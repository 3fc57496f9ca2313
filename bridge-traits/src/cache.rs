//! Media Cache Store Contract
//!
//! The host owns the physical span store (files on disk, a database of span
//! offsets, ...). The core only keeps non-owning index entries that refer to
//! spans by `(key, position)` and asks the store to delete them when the
//! budget is exceeded.
//!
//! ## Event flow
//!
//! ```text
//! ┌──────────────┐  SpanAdded / SpanRemoved   ┌────────────────┐
//! │  SpanCache   ├───────────────────────────>│ EvictionEngine │
//! │   (host)     │  SpanTouched / StartFile   │    (core)      │
//! │              │<───────────────────────────┤                │
//! └──────────────┘        remove_span()       └────────────────┘
//! ```
//!
//! `remove_span` must be safe to call for a span the store already deleted;
//! implementations may either succeed silently or return
//! [`BridgeError::SpanNotFound`](crate::error::BridgeError::SpanNotFound).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One contiguous, already-cached byte range for a content key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheSpan {
    /// Content key (the song identifier).
    pub key: String,
    /// Offset of the first byte within the content.
    pub position: u64,
    /// Number of bytes in the span. Always greater than zero.
    pub length: u64,
    /// Last access time in milliseconds. Non-decreasing across touches.
    pub last_touch_timestamp: i64,
}

impl CacheSpan {
    pub fn new(
        key: impl Into<String>,
        position: u64,
        length: u64,
        last_touch_timestamp: i64,
    ) -> Self {
        Self {
            key: key.into(),
            position,
            length,
            last_touch_timestamp,
        }
    }

    /// Returns a copy of this span touched at `timestamp`.
    ///
    /// The timestamp never moves backwards.
    pub fn touched(&self, timestamp: i64) -> Self {
        Self {
            last_touch_timestamp: timestamp.max(self.last_touch_timestamp),
            ..self.clone()
        }
    }
}

/// Physical span store queried and pruned by the core.
#[async_trait]
pub trait SpanCache: Send + Sync {
    /// Delete a span from the store.
    ///
    /// The store normally follows up with a `SpanRemoved` event; the evictor
    /// treats that event as a no-op for spans it already dropped.
    async fn remove_span(&self, span: &CacheSpan) -> Result<()>;

    /// Check whether `length` bytes starting at `position` are fully cached
    /// for `key`.
    async fn is_cached(&self, key: &str, position: u64, length: u64) -> Result<bool>;
}

/// Writes remote content straight into the span store.
#[async_trait]
pub trait CacheWriter: Send + Sync {
    /// Fetch `uri` and store its bytes under `cache_key`, starting at offset 0.
    ///
    /// Returns the number of bytes written.
    async fn write(&self, cache_key: &str, uri: &str) -> Result<u64>;
}
