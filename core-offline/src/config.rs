//! Offline cache configuration and budget policy

use crate::error::{OfflineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of concurrent fetch jobs per dispatch run.
pub const DEFAULT_DISPATCH_POOL_SIZE: usize = 10;

/// Default cap pushed to the host download manager.
pub const DEFAULT_MAX_PARALLEL_DOWNLOADS: usize = 100;

/// In-flight downloads below this completion percentage are discarded at restart.
pub const DEFAULT_PARTIAL_DOWNLOAD_THRESHOLD_PERCENT: u8 = 80;

/// Preference key for "also keep favourited songs offline".
pub const DOWNLOAD_FAVOURITES_KEY: &str = "download_favourites";

/// Configuration for the offline cache core.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Cache budget in bytes
    pub max_cache_bytes: u64,

    /// Which bytes count against the budget
    pub budget_policy: BudgetPolicy,

    /// Concurrent fetch jobs per reconciliation (default: 10)
    pub dispatch_pool_size: usize,

    /// Parallel downloads allowed in the host download manager (default: 100)
    pub max_parallel_downloads: usize,

    /// Completion percentage under which a download is discarded at restart (default: 80)
    pub partial_download_threshold_percent: u8,

    /// How long a fetch job waits for the playback owner to answer (default: 2s)
    pub playback_query_timeout: Duration,
}

impl OfflineConfig {
    /// Create a configuration with the given budget and default values.
    pub fn new(max_cache_bytes: u64) -> Self {
        Self {
            max_cache_bytes,
            budget_policy: BudgetPolicy::default(),
            dispatch_pool_size: DEFAULT_DISPATCH_POOL_SIZE,
            max_parallel_downloads: DEFAULT_MAX_PARALLEL_DOWNLOADS,
            partial_download_threshold_percent: DEFAULT_PARTIAL_DOWNLOAD_THRESHOLD_PERCENT,
            playback_query_timeout: Duration::from_secs(2),
        }
    }

    /// Set budget policy.
    pub fn with_budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.budget_policy = policy;
        self
    }

    /// Set dispatch pool size.
    pub fn with_dispatch_pool_size(mut self, size: usize) -> Self {
        self.dispatch_pool_size = size;
        self
    }

    /// Set download manager parallelism.
    pub fn with_max_parallel_downloads(mut self, max: usize) -> Self {
        self.max_parallel_downloads = max;
        self
    }

    /// Set partial download threshold.
    pub fn with_partial_download_threshold(mut self, percent: u8) -> Self {
        self.partial_download_threshold_percent = percent;
        self
    }

    /// Set playback query timeout.
    pub fn with_playback_query_timeout(mut self, timeout: Duration) -> Self {
        self.playback_query_timeout = timeout;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_cache_bytes == 0 {
            return Err(invalid("max_cache_bytes must be greater than 0"));
        }

        if self.dispatch_pool_size == 0 {
            return Err(invalid("dispatch_pool_size must be at least 1"));
        }

        if self.max_parallel_downloads == 0 {
            return Err(invalid("max_parallel_downloads must be at least 1"));
        }

        if self.partial_download_threshold_percent > 100 {
            return Err(invalid(
                "partial_download_threshold_percent must be between 0 and 100",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> OfflineError {
    OfflineError::InvalidConfig(message.to_string())
}

/// Which bytes the eviction loop compares against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPolicy {
    /// Pinned bytes count against the budget but are never evicted.
    #[default]
    TotalCache,

    /// Only evictable bytes count; pinned content is unconstrained.
    EvictableOnly,
}

impl BudgetPolicy {
    /// Bytes in use for the purpose of the budget check.
    pub fn charged_bytes(&self, evictable_bytes: u64, exempt_bytes: u64) -> u64 {
        match self {
            BudgetPolicy::TotalCache => evictable_bytes.saturating_add(exempt_bytes),
            BudgetPolicy::EvictableOnly => evictable_bytes,
        }
    }

    /// Returns a human-readable description of the policy.
    pub fn description(&self) -> &'static str {
        match self {
            BudgetPolicy::TotalCache => "Pinned content counts toward the cache budget",
            BudgetPolicy::EvictableOnly => "Only evictable content counts toward the cache budget",
        }
    }
}
