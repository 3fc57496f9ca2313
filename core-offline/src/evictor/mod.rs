//! # Eviction Engine
//!
//! Keeps the span cache under its byte budget by evicting the least recently
//! touched spans, while never evicting pinned content.
//!
//! ## Overview
//!
//! The host cache reports every span lifecycle change as a [`SpanEvent`]:
//! - `SpanAdded` / `SpanRemoved` when content is written or deleted
//! - `SpanTouched` when a span is read (recency bump)
//! - `StartFile` before a write of known length, to reserve headroom
//!
//! Pinned spans (see [`ExemptionOracle`](crate::exemption::ExemptionOracle))
//! are tracked for accounting only. When every remaining byte is pinned the
//! cache may stay over budget; this is reported as `EvictionExhausted`, not
//! as an error.
//!
//! ## Ordering
//!
//! Cache callbacks can arrive from several threads. [`EvictionEngine::spawn`]
//! runs a single consumer task so events are applied in delivery order:
//!
//! ```ignore
//! let handle = Arc::new(engine).spawn();
//!
//! // From a cache callback: fire and forget
//! handle.notify(SpanEvent::SpanAdded(span))?;
//!
//! // Before a write: wait until headroom exists
//! handle.dispatch(SpanEvent::StartFile { key, position: 0, length: Some(len) }).await?;
//! ```

mod engine;
mod index;

pub use engine::EvictionEngine;
pub use index::{Removed, SpanId, SpanIndex};

use crate::error::{OfflineError, Result};
use bridge_traits::CacheSpan;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Span lifecycle notifications delivered by the cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanEvent {
    SpanAdded(CacheSpan),
    SpanRemoved(CacheSpan),
    /// A span was read. `new` carries the bumped timestamp.
    SpanTouched { old: CacheSpan, new: CacheSpan },
    /// A write is about to start. `length` is `None` when the size is unknown.
    StartFile {
        key: String,
        position: u64,
        length: Option<u64>,
    },
}

impl SpanEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SpanEvent::SpanAdded(_) => "span_added",
            SpanEvent::SpanRemoved(_) => "span_removed",
            SpanEvent::SpanTouched { .. } => "span_touched",
            SpanEvent::StartFile { .. } => "start_file",
        }
    }
}

/// What a single event caused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Spans deleted from the store, oldest first
    pub evicted: Vec<CacheSpan>,
    /// Spans the store refused to delete; they stay tracked
    pub failed: Vec<CacheSpan>,
    /// Budget still exceeded with nothing left to evict
    pub exhausted: bool,
}

impl EvictionReport {
    pub fn freed_bytes(&self) -> u64 {
        self.evicted.iter().map(|s| s.length).sum()
    }
}

/// Accounting snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictorStats {
    pub evictable_bytes: u64,
    /// Bytes held by pinned songs (the "downloads" size shown to users)
    pub exempt_bytes: u64,
    pub evictable_spans: usize,
    pub exempt_spans: usize,
    pub max_bytes: u64,
}

impl EvictorStats {
    pub fn total_bytes(&self) -> u64 {
        self.evictable_bytes.saturating_add(self.exempt_bytes)
    }

    /// Returns true if the cache holds more than its budget.
    pub fn is_over_budget(&self) -> bool {
        self.total_bytes() > self.max_bytes
    }
}

struct Envelope {
    event: SpanEvent,
    reply: Option<oneshot::Sender<EvictionReport>>,
}

/// Sends span events to the evictor's consumer task.
#[derive(Debug, Clone)]
pub struct EvictorHandle {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl EvictorHandle {
    /// Queue an event without waiting for it to be applied.
    pub fn notify(&self, event: SpanEvent) -> Result<()> {
        self.sender
            .send(Envelope { event, reply: None })
            .map_err(|_| closed())
    }

    /// Queue an event and wait for its report.
    pub async fn dispatch(&self, event: SpanEvent) -> Result<EvictionReport> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Envelope {
                event,
                reply: Some(reply),
            })
            .map_err(|_| closed())?;
        receiver.await.map_err(|_| closed())
    }

    pub fn requires_span_touches(&self) -> bool {
        true
    }
}

fn closed() -> OfflineError {
    OfflineError::Internal("evictor event loop has stopped".to_string())
}

impl EvictionEngine {
    /// Start the consumer task. It stops once every handle has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self: Arc<Self>) -> EvictorHandle {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();

        tokio::spawn(async move {
            while let Some(Envelope { event, reply }) = receiver.recv().await {
                let report = self.handle(event).await;
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
            debug!("Evictor event loop stopped");
        });

        EvictorHandle { sender }
    }
}
