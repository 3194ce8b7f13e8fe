// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what happened to emitted records.
#[derive(Debug, Default)]
pub struct SinkStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
    filtered: AtomicU64,
    batches: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    format_failures: AtomicU64,
}

/// Point in time copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records accepted into the queue.
    pub enqueued: u64,
    /// Records dropped because the queue was full.
    pub dropped: u64,
    /// Records emitted after shutdown started.
    pub rejected: u64,
    /// Records flushed while the activation switch was off.
    pub discarded: u64,
    /// Records below the minimum level.
    pub filtered: u64,
    /// Flushes that took at least one record.
    pub batches: u64,
    /// Successful posts, one per destination.
    pub delivered: u64,
    /// Failed posts, one per destination.
    pub failed: u64,
    pub format_failures: u64,
}

impl SinkStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_format_failure(&self) {
        self.format_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            format_failures: self.format_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = SinkStats::default();
        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_dropped();
        stats.record_discarded(3);
        stats.record_delivered();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                enqueued: 2,
                dropped: 1,
                discarded: 3,
                delivered: 1,
                ..Default::default()
            }
        );
    }
}
