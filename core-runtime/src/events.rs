//! # Event Bus System
//!
//! Typed events published by the eviction engine and the download
//! orchestrator, delivered through `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - `CacheEvent`: span accounting and evictions
//! - `DownloadEvent`: reconciliation runs and per-song outcomes
//! - [`EventBus`]: cloneable publisher; every subscriber sees every event
//! - [`EventStream`]: subscriber narrowed by category or severity
//!
//! Publishing is best-effort. A bus without subscribers simply drops events.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Cache(CacheEvent::SpanEvicted {
//!     key: "song-1".to_string(),
//!     position: 0,
//!     length: 500,
//! }))
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Cache(_)));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
use tokio::sync::broadcast::{self, Receiver};
use uuid::Uuid;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Everything published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Span accounting and eviction events
    Cache(CacheEvent),
    /// Reconciliation and download events
    Download(DownloadEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }

    /// Failed evictions are errors, failed songs warnings, run summaries info.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::EvictionFailed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::ItemFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Download(DownloadEvent::ReconcileCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::QueueDrained) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the eviction engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A span belongs to a pinned song and is tracked outside the LRU index.
    SpanExempted { key: String, length: u64 },
    /// A span was chosen for eviction and deleted from the store.
    SpanEvicted {
        key: String,
        position: u64,
        length: u64,
    },
    /// The budget is still exceeded but every remaining byte is pinned.
    EvictionExhausted {
        exempt_bytes: u64,
        max_bytes: u64,
    },
    /// The store refused to delete an evicted span.
    EvictionFailed {
        key: String,
        position: u64,
        message: String,
    },
}

impl CacheEvent {
    pub fn description(&self) -> &str {
        match self {
            CacheEvent::SpanExempted { .. } => "Pinned span tracked outside LRU",
            CacheEvent::SpanEvicted { .. } => "Span evicted",
            CacheEvent::EvictionExhausted { .. } => "Only pinned content remains over budget",
            CacheEvent::EvictionFailed { .. } => "Span eviction failed",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events emitted by the download orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A reconciliation pass started.
    ReconcileStarted { run_id: Uuid, trigger: String },
    /// A song was resolved and handed to the download manager.
    ItemQueued { song_id: String },
    /// A song was skipped (unplayable, no format).
    ItemSkipped { song_id: String, reason: String },
    /// A song's fetch job failed.
    ItemFailed { song_id: String, message: String },
    /// A partial download was discarded at restart.
    PartialDownloadDiscarded { song_id: String, percent_complete: u8 },
    /// A reconciliation pass finished.
    ReconcileCompleted {
        run_id: Uuid,
        targets: usize,
        already_cached: usize,
        queued: usize,
        skipped: usize,
        failed: usize,
    },
    /// The download manager reported a state change.
    StateChanged {
        song_id: String,
        state: String,
        remaining: usize,
    },
    /// The download manager has nothing left to fetch.
    QueueDrained,
    /// Songs still pending in a direct pre-cache run.
    PrecacheProgress { remaining: usize },
}

impl DownloadEvent {
    pub fn description(&self) -> &str {
        match self {
            DownloadEvent::ReconcileStarted { .. } => "Reconciliation started",
            DownloadEvent::ItemQueued { .. } => "Song queued for download",
            DownloadEvent::ItemSkipped { .. } => "Song skipped",
            DownloadEvent::ItemFailed { .. } => "Song fetch failed",
            DownloadEvent::PartialDownloadDiscarded { .. } => "Partial download discarded",
            DownloadEvent::ReconcileCompleted { .. } => "Reconciliation completed",
            DownloadEvent::StateChanged { .. } => "Download state changed",
            DownloadEvent::QueueDrained => "Download complete",
            DownloadEvent::PrecacheProgress { .. } => "Pre-caching songs",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Cloneable publisher shared by the evictor and the orchestrator.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast `event`. Fails only when nobody is subscribed; callers
    /// ignore that with `let _ =`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Raw subscriber. Only events emitted after this call are seen.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe through an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

/// Which half of [`CoreEvent`] a stream accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Cache,
    Download,
}

impl CoreEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            CoreEvent::Cache(_) => EventCategory::Cache,
            CoreEvent::Download(_) => EventCategory::Download,
        }
    }
}

/// Subscriber that skips events outside a category or below a severity.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    category: Option<EventCategory>,
    min_severity: EventSeverity,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            category: None,
            min_severity: EventSeverity::Debug,
        }
    }

    pub fn only(mut self, category: EventCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn at_least(mut self, severity: EventSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.category.map_or(true, |c| c == event.category())
            && event.severity() >= self.min_severity
    }

    /// Wait for the next accepted event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when `n` events were dropped for this subscriber,
    /// `RecvError::Closed` once every bus handle is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next accepted event already buffered, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.accepts(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("category", &self.category)
            .field("min_severity", &self.min_severity)
            .finish()
    }
}
