// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::aggregator::BatchQueue;
use crate::config::SinkConfig;
use crate::delivery::DeliveryClient;
use crate::formatter::{build_message, MessageFormatter};
use crate::record::LogRecord;
use crate::stats::SinkStats;
use crate::switch::{ActivationSwitch, LevelSwitch};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Lifecycle of a sink. `Flushing` alternates with `Accepting` while the
/// flush task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    Idle = 0,
    Accepting = 1,
    Flushing = 2,
    Draining = 3,
    Stopped = 4,
}

impl SinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SinkState::Idle,
            1 => SinkState::Accepting,
            2 => SinkState::Flushing,
            3 => SinkState::Draining,
            _ => SinkState::Stopped,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SchedulerState(AtomicU8);

impl SchedulerState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SinkState::Idle as u8))
    }

    pub(crate) fn load(&self) -> SinkState {
        SinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: SinkState) {
        self.0.store(state as u8, Ordering::Release);
    }

    // Moves to `to` only from `from`, so a flush can't overwrite `Draining`.
    fn transition(&self, from: SinkState, to: SinkState) {
        let _ = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
    }
}

// Everything the flush task shares with the sink handle.
pub(crate) struct SchedulerParts {
    pub(crate) config: Arc<SinkConfig>,
    pub(crate) queue: Arc<BatchQueue>,
    pub(crate) formatter: Arc<dyn MessageFormatter>,
    pub(crate) delivery: DeliveryClient,
    pub(crate) activation: ActivationSwitch,
    pub(crate) level_switch: LevelSwitch,
    pub(crate) size_trigger: Arc<Notify>,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) drained: CancellationToken,
    pub(crate) state: Arc<SchedulerState>,
    pub(crate) stats: Arc<SinkStats>,
}

/// Takes batches off the queue on a timer or when a full batch is waiting,
/// and delivers them one record at a time.
pub struct BatchScheduler {
    config: Arc<SinkConfig>,
    queue: Arc<BatchQueue>,
    formatter: Arc<dyn MessageFormatter>,
    delivery: Option<DeliveryClient>,
    activation: ActivationSwitch,
    level_switch: LevelSwitch,
    size_trigger: Arc<Notify>,
    cancel_token: CancellationToken,
    drained: CancellationToken,
    state: Arc<SchedulerState>,
    stats: Arc<SinkStats>,
}

impl BatchScheduler {
    pub(crate) fn new(parts: SchedulerParts) -> Self {
        Self {
            config: parts.config,
            queue: parts.queue,
            formatter: parts.formatter,
            delivery: Some(parts.delivery),
            activation: parts.activation,
            level_switch: parts.level_switch,
            size_trigger: parts.size_trigger,
            cancel_token: parts.cancel_token,
            drained: parts.drained,
            state: parts.state,
            stats: parts.stats,
        }
    }

    /// Flush loop. Returns once cancelled and every queued record has been
    /// processed.
    pub async fn run(mut self) {
        self.state.transition(SinkState::Idle, SinkState::Accepting);

        let mut flush_interval = interval(self.config.batch.period);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("SLACK | Received shutdown signal, draining remaining records");
                    break;
                }
                _ = flush_interval.tick() => {
                    trace!("SLACK | Periodic flush");
                    self.flush_pending().await;
                }
                () = self.size_trigger.notified() => {
                    trace!("SLACK | Batch size limit reached, flushing");
                    self.flush_pending().await;
                    flush_interval.reset();
                }
            }
        }

        self.drain().await;
    }

    /// Flushes one batch, then keeps going while a full batch is waiting.
    pub async fn flush_pending(&mut self) {
        self.state.transition(SinkState::Accepting, SinkState::Flushing);
        loop {
            let batch = self.queue.take_batch();
            if batch.is_empty() {
                break;
            }
            self.emit_batch(batch).await;
            if !self.queue.has_full_batch() {
                break;
            }
        }
        self.state.transition(SinkState::Flushing, SinkState::Accepting);
    }

    /// Closes the queue, flushes everything still in it and releases the
    /// transport.
    pub async fn drain(&mut self) {
        self.state.store(SinkState::Draining);
        self.queue.close();
        loop {
            let batch = self.queue.take_batch();
            if batch.is_empty() {
                break;
            }
            self.emit_batch(batch).await;
        }
        self.delivery = None;
        self.state.store(SinkState::Stopped);
        self.drained.cancel();
        debug!("SLACK | Finished draining");
    }

    async fn emit_batch(&self, batch: Vec<LogRecord>) {
        self.stats.record_batch();

        if !self.activation.is_active() {
            debug!(
                "SLACK | Sink is inactive, discarding {} records",
                batch.len()
            );
            self.stats.record_discarded(batch.len() as u64);
            return;
        }
        let Some(delivery) = &self.delivery else {
            return;
        };

        debug!("SLACK | Flushing {} records", batch.len());
        let threshold = self
            .config
            .minimum_level
            .max(self.level_switch.minimum_level());

        for record in &batch {
            if record.severity < threshold {
                self.stats.record_filtered();
                continue;
            }

            let message = match build_message(self.formatter.as_ref(), record, &self.config) {
                Ok(message) => message,
                Err(e) => {
                    error!("SLACK | Failed to format record: {e}");
                    self.stats.record_format_failure();
                    continue;
                }
            };

            for result in delivery.send(&message, &self.config.channels).await {
                match result.outcome {
                    Ok(()) => self.stats.record_delivered(),
                    Err(e) => {
                        error!(
                            "SLACK | Failed to send message to {}: {e}",
                            result.destination
                        );
                        self.stats.record_failed();
                    }
                }
            }
        }
    }
}
