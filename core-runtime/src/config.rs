//! # Core Configuration Module
//!
//! Wires the host bridges the offline cache core depends on.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every collaborator the core calls into. It enforces fail-fast
//! validation so a missing bridge is reported at startup with an actionable
//! message rather than as a failed eviction or download later on.
//!
//! ## Required Dependencies
//!
//! - `SpanCache` - Physical span store
//! - `MetadataStore` - Pin state and format records
//! - `ContentResolver` - Song id to playable URL
//! - `DownloadManager` - Background download queue
//!
//! ## Optional Dependencies
//!
//! - `SettingsStore` - User preferences (defaults to an in-memory store,
//!   which means "download favourites" stays off)
//! - `CacheWriter` - Direct pre-caching without the download manager
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .span_cache(Arc::new(MySpanCache))
//!     .metadata_store(Arc::new(MyDatabase))
//!     .content_resolver(Arc::new(MyResolver))
//!     .download_manager(Arc::new(MyDownloadManager))
//!     .settings_store(Arc::new(MyPreferences))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    CacheWriter, ContentResolver, DownloadManager, InMemorySettingsStore, MetadataStore,
    SettingsStore, SpanCache,
};
use std::sync::Arc;

/// Core configuration for the offline cache core.
///
/// Holds all host bridges. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Physical span store (required)
    pub span_cache: Arc<dyn SpanCache>,

    /// Song pin state and format records (required)
    pub metadata_store: Arc<dyn MetadataStore>,

    /// Remote content resolution (required)
    pub content_resolver: Arc<dyn ContentResolver>,

    /// Background download queue (required)
    pub download_manager: Arc<dyn DownloadManager>,

    /// User preferences storage
    pub settings_store: Arc<dyn SettingsStore>,

    /// Direct cache writer for pre-caching (optional)
    pub cache_writer: Option<Arc<dyn CacheWriter>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("span_cache", &"SpanCache { ... }")
            .field("metadata_store", &"MetadataStore { ... }")
            .field("content_resolver", &"ContentResolver { ... }")
            .field("download_manager", &"DownloadManager { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "cache_writer",
                &self.cache_writer.as_ref().map(|_| "CacheWriter { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    span_cache: Option<Arc<dyn SpanCache>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    content_resolver: Option<Arc<dyn ContentResolver>>,
    download_manager: Option<Arc<dyn DownloadManager>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    cache_writer: Option<Arc<dyn CacheWriter>>,
}

impl CoreConfigBuilder {
    /// Sets the physical span store.
    pub fn span_cache(mut self, cache: Arc<dyn SpanCache>) -> Self {
        self.span_cache = Some(cache);
        self
    }

    /// Sets the metadata store.
    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    /// Sets the content resolver.
    pub fn content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.content_resolver = Some(resolver);
        self
    }

    /// Sets the download manager.
    pub fn download_manager(mut self, manager: Arc<dyn DownloadManager>) -> Self {
        self.download_manager = Some(manager);
        self
    }

    /// Sets the preferences store.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the direct cache writer used by pre-caching.
    pub fn cache_writer(mut self, writer: Arc<dyn CacheWriter>) -> Self {
        self.cache_writer = Some(writer);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] naming the first required bridge
    /// that was not provided.
    pub fn build(self) -> Result<CoreConfig> {
        let span_cache = self.span_cache.ok_or_else(|| {
            missing(
                "SpanCache",
                "No span cache provided. Wire the host media cache so evictions can delete spans.",
            )
        })?;

        let metadata_store = self.metadata_store.ok_or_else(|| {
            missing(
                "MetadataStore",
                "No metadata store provided. Pinned songs cannot be looked up without it.",
            )
        })?;

        let content_resolver = self.content_resolver.ok_or_else(|| {
            missing(
                "ContentResolver",
                "No content resolver provided. Pinned songs cannot be resolved to stream URLs.",
            )
        })?;

        let download_manager = self.download_manager.ok_or_else(|| {
            missing(
                "DownloadManager",
                "No download manager provided. Resolved songs cannot be queued for download.",
            )
        })?;

        let settings_store = self.settings_store.unwrap_or_else(|| {
            tracing::debug!("No SettingsStore provided, using in-memory preferences");
            Arc::new(InMemorySettingsStore::new())
        });

        Ok(CoreConfig {
            span_cache,
            metadata_store,
            content_resolver,
            download_manager,
            settings_store,
            cache_writer: self.cache_writer,
        })
    }
}

fn missing(capability: &str, message: &str) -> Error {
    Error::capability_missing(capability, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CacheSpan, DownloadRequest, FormatRecord, InFlightDownload, PlayabilityResult,
        PlayabilityStatus, SongDownloadInfo,
    };

    struct NullHost;

    #[async_trait]
    impl SpanCache for NullHost {
        async fn remove_span(&self, _span: &CacheSpan) -> BridgeResult<()> {
            Ok(())
        }

        async fn is_cached(&self, _key: &str, _position: u64, _length: u64) -> BridgeResult<bool> {
            Ok(false)
        }
    }

    #[async_trait]
    impl MetadataStore for NullHost {
        async fn is_downloaded(&self, _song_id: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn is_favourited(&self, _song_id: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn pinned_playlist_items(&self) -> BridgeResult<Vec<SongDownloadInfo>> {
            Ok(Vec::new())
        }

        async fn favourited_items(&self) -> BridgeResult<Vec<SongDownloadInfo>> {
            Ok(Vec::new())
        }

        async fn record_format(&self, _format: FormatRecord) -> BridgeResult<()> {
            Ok(())
        }

        async fn update_duration_text(&self, _song_id: &str, _text: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl ContentResolver for NullHost {
        async fn resolve(&self, _song_id: &str) -> BridgeResult<PlayabilityResult> {
            Ok(PlayabilityResult {
                status: PlayabilityStatus::Other("UNPLAYABLE".to_string()),
                chosen_format: None,
            })
        }
    }

    #[async_trait]
    impl DownloadManager for NullHost {
        async fn submit(&self, _request: DownloadRequest) -> BridgeResult<()> {
            Ok(())
        }

        async fn resume(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn in_flight(&self) -> BridgeResult<Vec<InFlightDownload>> {
            Ok(Vec::new())
        }

        async fn remove(&self, _id: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn set_max_parallel_downloads(&self, _max: usize) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn full_builder() -> CoreConfigBuilder {
        let host = Arc::new(NullHost);
        CoreConfig::builder()
            .span_cache(host.clone())
            .metadata_store(host.clone())
            .content_resolver(host.clone())
            .download_manager(host)
    }

    fn capability_of(result: Result<CoreConfig>) -> String {
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => capability,
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = full_builder().build().unwrap();
        assert!(config.cache_writer.is_none());
    }

    #[test]
    fn test_builder_requires_span_cache() {
        let host = Arc::new(NullHost);
        let result = CoreConfig::builder()
            .metadata_store(host.clone())
            .content_resolver(host.clone())
            .download_manager(host)
            .build();

        assert_eq!(capability_of(result), "SpanCache");
    }

    #[test]
    fn test_builder_requires_metadata_store() {
        let host = Arc::new(NullHost);
        let result = CoreConfig::builder()
            .span_cache(host.clone())
            .content_resolver(host.clone())
            .download_manager(host)
            .build();

        assert_eq!(capability_of(result), "MetadataStore");
    }

    #[test]
    fn test_builder_requires_content_resolver() {
        let host = Arc::new(NullHost);
        let result = CoreConfig::builder()
            .span_cache(host.clone())
            .metadata_store(host.clone())
            .download_manager(host)
            .build();

        assert_eq!(capability_of(result), "ContentResolver");
    }

    #[test]
    fn test_builder_requires_download_manager() {
        let host = Arc::new(NullHost);
        let result = CoreConfig::builder()
            .span_cache(host.clone())
            .metadata_store(host.clone())
            .content_resolver(host)
            .build();

        assert_eq!(capability_of(result), "DownloadManager");
    }

    #[tokio::test]
    async fn test_default_settings_store_is_empty() {
        let config = full_builder().build().unwrap();
        let value = config
            .settings_store
            .get_bool("download_favourites")
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = full_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("SpanCache { ... }"));
        assert!(debug.contains("cache_writer: None"));
    }
}
