//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between producers and the dispatcher worker
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Events accepted by the queue
    enqueued_count: AtomicU64,
    /// Events dropped due to full queue
    dropped_count: AtomicU64,
    /// Records that failed to format
    formatting_failure_count: AtomicU64,
    /// Successful append calls
    appended_batches: AtomicU64,
    /// Events delivered by successful append calls
    appended_events: AtomicU64,
    /// Failed append calls
    failed_appends: AtomicU64,
    /// Current pending batch length
    pending_len: AtomicUsize,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued_count(&self) {
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn formatting_failure_count(&self) -> u64 {
        self.formatting_failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_formatting_failure_count(&self) {
        self.formatting_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn appended_batches(&self) -> u64 {
        self.appended_batches.load(Ordering::Relaxed)
    }

    pub fn appended_events(&self) -> u64 {
        self.appended_events.load(Ordering::Relaxed)
    }

    /// Record a successful append of `events` events
    pub fn record_append(&self, events: usize) {
        self.appended_batches.fetch_add(1, Ordering::Relaxed);
        self.appended_events
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn failed_appends(&self) -> u64 {
        self.failed_appends.load(Ordering::Relaxed)
    }

    pub fn inc_failed_appends(&self) {
        self.failed_appends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_len(&self) -> usize {
        self.pending_len.load(Ordering::Relaxed)
    }

    pub fn set_pending_len(&self, len: usize) {
        self.pending_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued_count: self.enqueued_count(),
            dropped_count: self.dropped_count(),
            formatting_failure_count: self.formatting_failure_count(),
            appended_batches: self.appended_batches(),
            appended_events: self.appended_events(),
            failed_appends: self.failed_appends(),
            pending_len: self.pending_len(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub enqueued_count: u64,
    pub dropped_count: u64,
    pub formatting_failure_count: u64,
    pub appended_batches: u64,
    pub appended_events: u64,
    pub failed_appends: u64,
    pub pending_len: usize,
}
