//! # Exemption Oracle
//!
//! Decides whether a content key is pinned and therefore protected from
//! eviction. A song is pinned when it belongs to a playlist marked for
//! download, or when it is favourited and the user keeps favourites offline.
//!
//! Nothing is cached here: pin status and the favourites preference can both
//! change between two cache events, so every query goes to the stores.

use crate::config::DOWNLOAD_FAVOURITES_KEY;
use crate::error::Result;
use bridge_traits::{MetadataStore, SettingsStore};
use std::sync::Arc;
use tracing::trace;

/// Answers "is this key protected from eviction?".
#[derive(Clone)]
pub struct ExemptionOracle {
    metadata: Arc<dyn MetadataStore>,
    settings: Arc<dyn SettingsStore>,
}

impl ExemptionOracle {
    pub fn new(metadata: Arc<dyn MetadataStore>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { metadata, settings }
    }

    /// Whether favourited songs are kept offline. Missing preference reads as `false`.
    pub async fn download_favourites_enabled(&self) -> Result<bool> {
        Ok(self
            .settings
            .get_bool(DOWNLOAD_FAVOURITES_KEY)
            .await?
            .unwrap_or(false))
    }

    /// Returns `true` if `key` must never be evicted.
    pub async fn is_exempt(&self, key: &str) -> Result<bool> {
        if self.metadata.is_downloaded(key).await? {
            trace!(key, "pinned by downloaded playlist");
            return Ok(true);
        }

        if !self.download_favourites_enabled().await? {
            return Ok(false);
        }

        let favourited = self.metadata.is_favourited(key).await?;
        if favourited {
            trace!(key, "pinned as favourite");
        }
        Ok(favourited)
    }
}

impl std::fmt::Debug for ExemptionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExemptionOracle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, FormatRecord, InMemorySettingsStore, SongDownloadInfo};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Metadata {}

        #[async_trait::async_trait]
        impl MetadataStore for Metadata {
            async fn is_downloaded(&self, song_id: &str) -> BridgeResult<bool>;
            async fn is_favourited(&self, song_id: &str) -> BridgeResult<bool>;
            async fn pinned_playlist_items(&self) -> BridgeResult<Vec<SongDownloadInfo>>;
            async fn favourited_items(&self) -> BridgeResult<Vec<SongDownloadInfo>>;
            async fn record_format(&self, format: FormatRecord) -> BridgeResult<()>;
            async fn update_duration_text(&self, song_id: &str, text: &str) -> BridgeResult<()>;
        }
    }

    async fn oracle(metadata: MockMetadata, favourites: Option<bool>) -> ExemptionOracle {
        let settings = Arc::new(InMemorySettingsStore::new());
        if let Some(enabled) = favourites {
            settings
                .set_bool(DOWNLOAD_FAVOURITES_KEY, enabled)
                .await
                .unwrap();
        }
        ExemptionOracle::new(Arc::new(metadata), settings)
    }

    #[tokio::test]
    async fn test_downloaded_song_is_exempt_without_favourite_lookup() {
        let mut metadata = MockMetadata::new();
        metadata
            .expect_is_downloaded()
            .with(eq("s1"))
            .times(1)
            .returning(|_| Ok(true));
        metadata.expect_is_favourited().never();

        let oracle = oracle(metadata, Some(true)).await;
        assert!(oracle.is_exempt("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_favourite_ignored_when_preference_off() {
        let mut metadata = MockMetadata::new();
        metadata.expect_is_downloaded().returning(|_| Ok(false));
        metadata.expect_is_favourited().never();

        let oracle = oracle(metadata, None).await;
        assert!(!oracle.download_favourites_enabled().await.unwrap());
        assert!(!oracle.is_exempt("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_favourite_exempt_when_preference_on() {
        let mut metadata = MockMetadata::new();
        metadata.expect_is_downloaded().returning(|_| Ok(false));
        metadata
            .expect_is_favourited()
            .with(eq("s2"))
            .returning(|_| Ok(true));

        let oracle = oracle(metadata, Some(true)).await;
        assert!(oracle.is_exempt("s2").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let mut metadata = MockMetadata::new();
        metadata
            .expect_is_downloaded()
            .returning(|_| Err(BridgeError::DatabaseError("locked".to_string())));

        let oracle = oracle(metadata, None).await;
        assert!(oracle.is_exempt("s1").await.is_err());
    }
}
