//! # Parallel Job Dispatcher
//!
//! Fans a fixed list of work items out across a bounded pool of tokio tasks.
//!
//! ## Overview
//!
//! Worker `i` starts on item `i`. After that every worker claims the next
//! unprocessed index from a shared [`ClaimCursor`], which starts at the pool
//! size. Workers that finish early pick up more items, so the pool balances
//! itself instead of splitting the list into static shards.
//!
//! Every index in `0..items.len()` is processed exactly once. A failing or
//! panicking job is recorded in the [`DispatchReport`] and the worker moves on
//! to its next claim.
//!
//! ## Usage
//!
//! ```ignore
//! let dispatcher = JobDispatcher::new(10)?;
//! let report = dispatcher
//!     .run(song_ids, |song_id| async move { fetch(song_id).await })
//!     .await?;
//!
//! for failure in &report.failures {
//!     warn!(index = failure.index, "job failed: {}", failure.error);
//! }
//! ```

use crate::error::{OfflineError, Result};
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Shared "next unclaimed index" counter.
#[derive(Debug)]
pub struct ClaimCursor {
    next: AtomicUsize,
    len: usize,
}

impl ClaimCursor {
    /// Indices below `start` are reserved for the workers' first items.
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            next: AtomicUsize::new(start),
            len,
        }
    }

    /// Claim the next index, or `None` once the list is exhausted.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        (index < self.len).then_some(index)
    }
}

/// A job that failed for one item.
#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub error: OfflineError,
}

/// Outcome of a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of items handed to the worker
    pub processed: usize,
    pub failures: Vec<ItemFailure>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.processed - self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bounded-parallelism pool over a fixed job list.
#[derive(Debug, Clone, Copy)]
pub struct JobDispatcher {
    pool_size: usize,
}

impl JobDispatcher {
    /// # Errors
    ///
    /// Returns [`OfflineError::InvalidConfig`] if `pool_size` is zero.
    pub fn new(pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(OfflineError::InvalidConfig(
                "dispatch pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self { pool_size })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run `worker` once for every item and wait until all workers retire.
    ///
    /// Returns immediately for an empty list. Per-item failures are collected
    /// in the report; the returned error is reserved for a worker task that
    /// could not be joined.
    #[instrument(
        skip(self, items, worker),
        fields(items = items.len(), pool_size = self.pool_size)
    )]
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, worker: F) -> Result<DispatchReport>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if items.is_empty() {
            return Ok(DispatchReport::default());
        }

        let workers = self.pool_size.min(items.len());
        let cursor = Arc::new(ClaimCursor::new(self.pool_size, items.len()));
        let items = Arc::new(items);
        let worker = Arc::new(worker);

        let handles: Vec<_> = (0..workers)
            .map(|first| {
                let cursor = Arc::clone(&cursor);
                let items = Arc::clone(&items);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move { drain(first, &cursor, &items, worker.as_ref()).await })
            })
            .collect();

        let mut report = DispatchReport::default();
        for joined in join_all(handles).await {
            let partial = joined
                .map_err(|e| OfflineError::Internal(format!("dispatch worker failed: {}", e)))?;
            report.processed += partial.processed;
            report.failures.extend(partial.failures);
        }
        report.failures.sort_by_key(|f| f.index);

        debug!(
            processed = report.processed,
            failed = report.failures.len(),
            "Dispatch run complete"
        );
        Ok(report)
    }
}

async fn drain<T, F, Fut>(
    first: usize,
    cursor: &ClaimCursor,
    items: &[T],
    worker: &F,
) -> DispatchReport
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut report = DispatchReport::default();
    let mut next = (first < items.len()).then_some(first);

    while let Some(index) = next {
        report.processed += 1;

        // The closure itself may panic before handing back its future.
        let outcome = AssertUnwindSafe(async { worker(items[index].clone()).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(OfflineError::Internal("job panicked".to_string())));

        if let Err(error) = outcome {
            if error.is_expected() {
                debug!(index, reason = %error, "Dispatch job skipped");
            } else {
                warn!(index, error = %error, "Dispatch job failed");
            }
            report.failures.push(ItemFailure { index, error });
        }

        next = cursor.claim();
    }

    report
}
