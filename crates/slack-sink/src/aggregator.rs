// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::LogRecord;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Outcome of [`BatchQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// The record was queued; `pending` records are now waiting.
    Accepted { pending: usize },
    /// The queue was full and the record was dropped.
    Dropped,
    /// The queue was closed for shutdown and the record was dropped.
    Rejected,
}

#[derive(Debug, Default)]
struct Pending {
    records: VecDeque<LogRecord>,
    closed: bool,
}

/// Bounded FIFO of records waiting to be flushed.
///
/// Producers push from any thread; the flush task takes batches from the
/// front. The lock is only held to move records in or out.
#[derive(Debug)]
pub struct BatchQueue {
    pending: Mutex<Pending>,
    batch_size: usize,
    queue_limit: usize,
}

impl BatchQueue {
    #[must_use]
    pub fn new(batch_size: usize, queue_limit: usize) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            batch_size: batch_size.max(1),
            queue_limit,
        }
    }

    // A panic while holding the lock can't leave the deque half updated, so
    // the data stays usable.
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: LogRecord) -> Enqueue {
        let mut pending = self.lock();
        if pending.closed {
            return Enqueue::Rejected;
        }
        if pending.records.len() >= self.queue_limit {
            debug!(
                "SLACK | Queue limit of {} reached, dropping record",
                self.queue_limit
            );
            return Enqueue::Dropped;
        }
        pending.records.push_back(record);
        Enqueue::Accepted {
            pending: pending.records.len(),
        }
    }

    /// Stops accepting records. Records already queued can still be taken.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Removes up to `batch_size` records from the front, in arrival order.
    pub fn take_batch(&self) -> Vec<LogRecord> {
        let mut pending = self.lock();
        if pending.records.len() <= self.batch_size {
            return Vec::from(std::mem::take(&mut pending.records));
        }
        pending.records.drain(..self.batch_size).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether at least one full batch is waiting.
    #[must_use]
    pub fn has_full_batch(&self) -> bool {
        self.len() >= self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;
    use std::sync::Arc;
    use std::thread;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Severity::Information, message)
    }

    #[test]
    fn test_take_batch_preserves_order() {
        let queue = BatchQueue::new(2, 10);
        for message in ["a", "b", "c"] {
            queue.push(record(message));
        }

        let first: Vec<_> = queue
            .take_batch()
            .into_iter()
            .map(|r| r.rendered_message)
            .collect();
        assert_eq!(first, vec!["a", "b"]);
        assert!(!queue.has_full_batch());

        let second = queue.take_batch();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].rendered_message, "c");
        assert!(queue.is_empty());
        assert!(queue.take_batch().is_empty());
    }

    #[test]
    fn test_push_reports_pending() {
        let queue = BatchQueue::new(3, 10);
        assert_eq!(queue.push(record("a")), Enqueue::Accepted { pending: 1 });
        assert_eq!(queue.push(record("b")), Enqueue::Accepted { pending: 2 });
        assert!(!queue.has_full_batch());
        queue.push(record("c"));
        assert!(queue.has_full_batch());
    }

    #[test]
    fn test_queue_limit_drops_newest() {
        let queue = BatchQueue::new(10, 2);
        queue.push(record("a"));
        queue.push(record("b"));
        assert_eq!(queue.push(record("c")), Enqueue::Dropped);

        let batch: Vec<_> = queue
            .take_batch()
            .into_iter()
            .map(|r| r.rendered_message)
            .collect();
        assert_eq!(batch, vec!["a", "b"]);
    }

    #[test]
    fn test_closed_queue_rejects_new_records() {
        let queue = BatchQueue::new(10, 10);
        queue.push(record("before"));
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.push(record("after")), Enqueue::Rejected);
        assert_eq!(queue.len(), 1);

        let batch = queue.take_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].rendered_message, "before");
        assert_eq!(queue.push(record("later")), Enqueue::Rejected);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_push_and_take() {
        let queue = Arc::new(BatchQueue::new(7, 10_000));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(record(&format!("{p}-{i}")));
                    }
                })
            })
            .collect();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut taken = 0;
                for _ in 0..50 {
                    taken += queue.take_batch().len();
                    thread::yield_now();
                }
                taken
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        let mut total = consumer.join().unwrap();
        while !queue.is_empty() {
            total += queue.take_batch().len();
        }
        assert_eq!(total, 400);
    }
}
