//! Preferences Storage Abstraction
//!
//! Key-value settings storage for user preferences such as
//! "download favourites". Values are read on every use because the user may
//! flip them at any time.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;

/// User preferences, backed by whatever the host persists them in.
///
/// Missing keys read as `None`; the caller picks the default.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn enable_favourites(store: &dyn SettingsStore) -> Result<()> {
///     store.set_bool("download_favourites", true).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// `None` if unset.
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Removing an unknown key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}


/// Process-local settings store.
///
/// Suitable for tests and for hosts that persist preferences elsewhere and
/// only mirror them into the core.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<String, bool>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.values.read().get(key).copied())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
