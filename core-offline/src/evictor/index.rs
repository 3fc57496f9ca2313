//! Span index
//!
//! Tracks every span the evictor has been told about, split into an ordered
//! evictable set and an exempt set that only contributes to accounting.

use bridge_traits::CacheSpan;
use std::collections::{BTreeMap, HashMap};

/// Identity of a span inside the cache: its key and start offset.
pub type SpanId = (String, u64);

/// Eviction order: oldest touch first, then key, then offset.
type OrderKey = (i64, String, u64);

#[derive(Debug, Clone)]
enum Placement {
    Evictable(OrderKey, u64),
    Exempt(u64),
}

/// Where a removed span had been tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removed {
    Evictable(u64),
    Exempt(u64),
}

#[derive(Debug, Default)]
pub struct SpanIndex {
    placements: HashMap<SpanId, Placement>,
    evictable: BTreeMap<OrderKey, u64>,
    evictable_bytes: u64,
    exempt_bytes: u64,
}

impl SpanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `span` as an eviction candidate, replacing any entry with the same id.
    pub fn insert_evictable(&mut self, span: &CacheSpan) {
        self.remove(&span.key, span.position);

        let order = (span.last_touch_timestamp, span.key.clone(), span.position);
        self.evictable.insert(order.clone(), span.length);
        self.evictable_bytes = self.evictable_bytes.saturating_add(span.length);
        self.placements.insert(
            (span.key.clone(), span.position),
            Placement::Evictable(order, span.length),
        );
    }

    /// Track `span` for accounting only, replacing any entry with the same id.
    pub fn insert_exempt(&mut self, span: &CacheSpan) {
        self.remove(&span.key, span.position);

        self.exempt_bytes = self.exempt_bytes.saturating_add(span.length);
        self.placements.insert(
            (span.key.clone(), span.position),
            Placement::Exempt(span.length),
        );
    }

    /// Forget the span at `key`/`position`. Unknown spans return `None`.
    pub fn remove(&mut self, key: &str, position: u64) -> Option<Removed> {
        let placement = self.placements.remove(&(key.to_string(), position))?;

        match placement {
            Placement::Evictable(order, length) => {
                self.evictable.remove(&order);
                self.evictable_bytes = self.evictable_bytes.saturating_sub(length);
                Some(Removed::Evictable(length))
            }
            Placement::Exempt(length) => {
                self.exempt_bytes = self.exempt_bytes.saturating_sub(length);
                Some(Removed::Exempt(length))
            }
        }
    }

    /// Remove and return the least recently touched evictable span.
    pub fn pop_oldest(&mut self) -> Option<CacheSpan> {
        let ((timestamp, key, position), length) = self.evictable.pop_first()?;
        self.placements.remove(&(key.clone(), position));
        self.evictable_bytes = self.evictable_bytes.saturating_sub(length);
        Some(CacheSpan::new(key, position, length, timestamp))
    }

    pub fn contains(&self, key: &str, position: u64) -> bool {
        self.placements.contains_key(&(key.to_string(), position))
    }

    pub fn evictable_bytes(&self) -> u64 {
        self.evictable_bytes
    }

    pub fn exempt_bytes(&self) -> u64 {
        self.exempt_bytes
    }

    pub fn evictable_len(&self) -> usize {
        self.evictable.len()
    }

    pub fn exempt_len(&self) -> usize {
        self.placements.len() - self.evictable.len()
    }

    pub fn has_evictable(&self) -> bool {
        !self.evictable.is_empty()
    }
}
