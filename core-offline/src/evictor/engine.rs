//! Eviction engine
//!
//! Applies span events to the [`SpanIndex`] and evicts the least recently
//! touched non-exempt spans while the cache is over budget.
//!
//! Each event runs in three steps:
//! 1. Exemption is looked up for the incoming span (async, no lock held).
//! 2. Index mutation, accounting and victim selection run as one critical
//!    section. Victims leave the index inside it.
//! 3. Victims are deleted from the store after the lock is released, so a
//!    store that reports the removal back to the evictor cannot deadlock.

use super::index::SpanIndex;
use super::{EvictionReport, EvictorStats, SpanEvent};
use crate::config::{BudgetPolicy, OfflineConfig};
use crate::exemption::ExemptionOracle;
use bridge_traits::{CacheSpan, SpanCache};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Least-recently-used span evictor with pinned-content exemption.
pub struct EvictionEngine {
    index: Mutex<SpanIndex>,
    max_bytes: u64,
    policy: BudgetPolicy,
    oracle: ExemptionOracle,
    cache: Arc<dyn SpanCache>,
    events: EventBus,
}

/// Outcome of one critical section.
#[derive(Debug, Default)]
struct Selection {
    victims: Vec<CacheSpan>,
    exhausted: Option<(u64, u64)>,
}

impl EvictionEngine {
    pub fn new(
        config: &OfflineConfig,
        oracle: ExemptionOracle,
        cache: Arc<dyn SpanCache>,
        events: EventBus,
    ) -> Self {
        Self {
            index: Mutex::new(SpanIndex::new()),
            max_bytes: config.max_cache_bytes,
            policy: config.budget_policy,
            oracle,
            cache,
            events,
        }
    }

    /// The cache must deliver touch events, not only adds and removals.
    pub fn requires_span_touches(&self) -> bool {
        true
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Snapshot of the current accounting.
    pub fn stats(&self) -> EvictorStats {
        let index = self.index.lock();
        EvictorStats {
            evictable_bytes: index.evictable_bytes(),
            exempt_bytes: index.exempt_bytes(),
            evictable_spans: index.evictable_len(),
            exempt_spans: index.exempt_len(),
            max_bytes: self.max_bytes,
        }
    }

    /// Apply one span event and evict as needed.
    #[instrument(skip(self, event), fields(event = event.kind()))]
    pub async fn handle(&self, event: SpanEvent) -> EvictionReport {
        match event {
            SpanEvent::SpanAdded(span) => {
                let exempt = self.check_exempt(&span.key).await;
                let selection = {
                    let mut index = self.index.lock();
                    place(&mut index, &span, exempt);
                    self.select_victims(&mut index, 0)
                };
                self.announce_exempt(&span, exempt);
                self.finish(selection).await
            }
            SpanEvent::SpanRemoved(span) => {
                let removed = self.index.lock().remove(&span.key, span.position);
                if removed.is_none() {
                    trace!(key = %span.key, position = span.position, "span already untracked");
                }
                EvictionReport::default()
            }
            SpanEvent::SpanTouched { old, new } => {
                let exempt = self.check_exempt(&new.key).await;
                let selection = {
                    let mut index = self.index.lock();
                    index.remove(&old.key, old.position);
                    place(&mut index, &new, exempt);
                    self.select_victims(&mut index, 0)
                };
                self.announce_exempt(&new, exempt);
                self.finish(selection).await
            }
            SpanEvent::StartFile {
                key,
                position,
                length,
            } => {
                let Some(required) = length else {
                    trace!(%key, position, "write length unknown, nothing reserved");
                    return EvictionReport::default();
                };
                let selection = {
                    let mut index = self.index.lock();
                    self.select_victims(&mut index, required)
                };
                self.finish(selection).await
            }
        }
    }

    /// Pinned status for `key`. A failed lookup keeps the span pinned until its next touch.
    async fn check_exempt(&self, key: &str) -> bool {
        match self.oracle.is_exempt(key).await {
            Ok(exempt) => exempt,
            Err(e) => {
                warn!(key, error = %e, "Exemption lookup failed, treating span as pinned");
                true
            }
        }
    }

    fn over_budget(&self, index: &SpanIndex, required: u64) -> bool {
        self.policy
            .charged_bytes(index.evictable_bytes(), index.exempt_bytes())
            .saturating_add(required)
            > self.max_bytes
    }

    fn select_victims(&self, index: &mut SpanIndex, required: u64) -> Selection {
        let mut selection = Selection::default();

        while self.over_budget(index, required) {
            match index.pop_oldest() {
                Some(span) => selection.victims.push(span),
                None => break,
            }
        }

        if self.over_budget(index, required) {
            selection.exhausted = Some((index.exempt_bytes(), self.max_bytes));
        }

        selection
    }

    async fn finish(&self, selection: Selection) -> EvictionReport {
        let mut report = EvictionReport::default();

        if let Some((exempt_bytes, max_bytes)) = selection.exhausted {
            debug!(
                exempt_bytes,
                max_bytes, "Eviction exhausted, only pinned content remains"
            );
            report.exhausted = true;
            let _ = self
                .events
                .emit(CoreEvent::Cache(CacheEvent::EvictionExhausted {
                    exempt_bytes,
                    max_bytes,
                }));
        }

        for victim in selection.victims {
            match self.cache.remove_span(&victim).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    trace!(key = %victim.key, "span already deleted from store");
                }
                Err(e) => {
                    warn!(
                        key = %victim.key,
                        position = victim.position,
                        error = %e,
                        "Failed to delete evicted span"
                    );
                    {
                        let mut index = self.index.lock();
                        if !index.contains(&victim.key, victim.position) {
                            index.insert_evictable(&victim);
                        }
                    }
                    let _ = self.events.emit(CoreEvent::Cache(CacheEvent::EvictionFailed {
                        key: victim.key.clone(),
                        position: victim.position,
                        message: e.to_string(),
                    }));
                    report.failed.push(victim);
                    continue;
                }
            }

            debug!(
                key = %victim.key,
                position = victim.position,
                bytes = victim.length,
                "Evicted span"
            );
            let _ = self.events.emit(CoreEvent::Cache(CacheEvent::SpanEvicted {
                key: victim.key.clone(),
                position: victim.position,
                length: victim.length,
            }));
            report.evicted.push(victim);
        }

        report
    }

    fn announce_exempt(&self, span: &CacheSpan, exempt: bool) {
        if !exempt {
            return;
        }
        trace!(key = %span.key, bytes = span.length, "span pinned");
        let _ = self.events.emit(CoreEvent::Cache(CacheEvent::SpanExempted {
            key: span.key.clone(),
            length: span.length,
        }));
    }
}

fn place(index: &mut SpanIndex, span: &CacheSpan, exempt: bool) {
    if exempt {
        index.insert_exempt(span);
    } else {
        index.insert_evictable(span);
    }
}

impl std::fmt::Debug for EvictionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionEngine")
            .field("max_bytes", &self.max_bytes)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        BridgeError, FormatRecord, InMemorySettingsStore, MetadataStore, SongDownloadInfo,
    };
    use std::collections::HashSet;

    struct PinnedSet(HashSet<String>);

    #[async_trait::async_trait]
    impl MetadataStore for PinnedSet {
        async fn is_downloaded(&self, song_id: &str) -> BridgeResult<bool> {
            if song_id == "broken" {
                return Err(BridgeError::DatabaseError("locked".to_string()));
            }
            Ok(self.0.contains(song_id))
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

    #[derive(Default)]
    struct RecordingCache {
        removed: parking_lot::Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SpanCache for RecordingCache {
        async fn remove_span(&self, span: &CacheSpan) -> BridgeResult<()> {
            if self.fail {
                return Err(BridgeError::OperationFailed("read-only".to_string()));
            }
            self.removed.lock().push(span.key.clone());
            Ok(())
        }
        async fn is_cached(&self, _key: &str, _position: u64, _length: u64) -> BridgeResult<bool> {
            Ok(false)
        }
    }

    fn engine(max: u64, pinned: &[&str], cache: Arc<RecordingCache>) -> EvictionEngine {
        let metadata = PinnedSet(pinned.iter().map(|s| s.to_string()).collect());
        let oracle = ExemptionOracle::new(
            Arc::new(metadata),
            Arc::new(InMemorySettingsStore::new()),
        );
        EvictionEngine::new(&OfflineConfig::new(max), oracle, cache, EventBus::default())
    }

    #[tokio::test]
    async fn test_add_under_budget_evicts_nothing() {
        let cache = Arc::new(RecordingCache::default());
        let engine = engine(1000, &[], cache.clone());

        let report = engine
            .handle(SpanEvent::SpanAdded(CacheSpan::new("a", 0, 400, 1)))
            .await;

        assert!(report.evicted.is_empty());
        assert_eq!(engine.stats().evictable_bytes, 400);
        assert!(cache.removed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_file_reserves_headroom() {
        let cache = Arc::new(RecordingCache::default());
        let engine = engine(1000, &[], cache.clone());
        engine.handle(SpanEvent::SpanAdded(CacheSpan::new("a", 0, 600, 1))).await;
        engine.handle(SpanEvent::SpanAdded(CacheSpan::new("b", 0, 300, 2))).await;

        let report = engine
            .handle(SpanEvent::StartFile {
                key: "c".to_string(),
                position: 0,
                length: Some(200),
            })
            .await;

        assert_eq!(report.evicted.len(), 1);
        assert_eq!(report.evicted[0].key, "a");
        assert_eq!(engine.stats().evictable_bytes, 300);
    }

    #[tokio::test]
    async fn test_start_file_unknown_length_is_noop() {
        let cache = Arc::new(RecordingCache::default());
        let engine = engine(100, &[], cache);
        engine.handle(SpanEvent::SpanAdded(CacheSpan::new("a", 0, 100, 1))).await;

        let report = engine
            .handle(SpanEvent::StartFile {
                key: "b".to_string(),
                position: 0,
                length: None,
            })
            .await;
        assert!(report.evicted.is_empty());
        assert_eq!(engine.stats().evictable_spans, 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_pins_span() {
        let cache = Arc::new(RecordingCache::default());
        let engine = engine(100, &[], cache);

        let report = engine
            .handle(SpanEvent::SpanAdded(CacheSpan::new("broken", 0, 500, 1)))
            .await;

        assert!(report.evicted.is_empty());
        assert!(report.exhausted);
        assert_eq!(engine.stats().exempt_bytes, 500);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_span_tracked() {
        let cache = Arc::new(RecordingCache {
            fail: true,
            ..Default::default()
        });
        let engine = engine(100, &[], cache);
        let mut events = engine.events.subscribe();

        let report = engine
            .handle(SpanEvent::SpanAdded(CacheSpan::new("a", 0, 150, 1)))
            .await;

        assert!(report.evicted.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(engine.stats().evictable_bytes, 150);
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Cache(CacheEvent::EvictionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = Arc::new(RecordingCache::default());
        let engine = engine(1000, &[], cache);
        let span = CacheSpan::new("a", 0, 100, 1);
        engine.handle(SpanEvent::SpanAdded(span.clone())).await;

        engine.handle(SpanEvent::SpanRemoved(span.clone())).await;
        engine.handle(SpanEvent::SpanRemoved(span)).await;

        let stats = engine.stats();
        assert_eq!(stats.evictable_bytes, 0);
        assert_eq!(stats.evictable_spans, 0);
    }

    #[test]
    fn test_requires_span_touches() {
        let engine = engine(1, &[], Arc::new(RecordingCache::default()));
        assert!(engine.requires_span_touches());
        assert_eq!(engine.max_bytes(), 1);
    }
}
