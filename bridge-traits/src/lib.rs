//! # Host Bridge Traits
//!
//! Collaborator contracts that the host application implements for the
//! offline cache core.
//!
//! ## Overview
//!
//! The core decides *what* to evict and *what* to fetch. Everything that
//! touches the platform (the physical span store, the song database, the
//! remote resolution service, the background download queue, preferences and
//! the host log) sits behind one of the traits below.
//!
//! ## Traits
//!
//! ### Cache
//! - [`SpanCache`](cache::SpanCache) - Physical span store: delete spans, answer cache hits
//! - [`CacheWriter`](cache::CacheWriter) - Fetch a URI straight into the span store
//!
//! ### Content
//! - [`MetadataStore`](metadata::MetadataStore) - Pin state and stream format records
//! - [`ContentResolver`](resolver::ContentResolver) - Song id to playable format
//! - [`DownloadManager`](download::DownloadManager) - Background download queue
//!
//! ### Platform
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences
//! - [`LoggerSink`](log_sink::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`: the core calls bridges from several
//! dispatch workers at once and from the evictor's event loop.

pub mod cache;
pub mod download;
pub mod error;
pub mod log_sink;
pub mod metadata;
pub mod resolver;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache::{CacheSpan, CacheWriter, SpanCache};
pub use download::{DownloadManager, DownloadRequest, DownloadState, InFlightDownload};
pub use log_sink::{LogEntry, LogLevel, LoggerSink};
pub use metadata::{FormatRecord, MetadataStore, SongDownloadInfo};
pub use resolver::{ContentResolver, PlayabilityResult, PlayabilityStatus, StreamFormat};
pub use storage::{InMemorySettingsStore, SettingsStore};
