// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::aggregator::{BatchQueue, Enqueue};
use crate::config::SinkConfig;
use crate::delivery::{DeliveryClient, Transport};
use crate::errors::SinkError;
use crate::flusher::{BatchScheduler, SchedulerParts, SchedulerState, SinkState};
use crate::formatter::{DefaultFormatter, MessageFormatter};
use crate::http::ReqwestTransport;
use crate::record::LogRecord;
use crate::stats::{SinkStats, StatsSnapshot};
use crate::switch::{ActivationSwitch, LevelSwitch};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

enum Lifecycle {
    /// Built but not started; the scheduler hasn't been spawned yet.
    Pending(BatchScheduler),
    Running(JoinHandle<()>),
    /// Started shutting down, or finished.
    Finished,
}

/// Log sink delivering records to a Slack incoming webhook.
///
/// [`SlackSink::emit`] only queues the record. A background task started by
/// [`SlackSink::start`] formats and sends queued records in batches.
pub struct SlackSink {
    config: Arc<SinkConfig>,
    queue: Arc<BatchQueue>,
    size_trigger: Arc<Notify>,
    activation: ActivationSwitch,
    level_switch: LevelSwitch,
    state: Arc<SchedulerState>,
    stats: Arc<SinkStats>,
    cancel_token: CancellationToken,
    drained: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl SlackSink {
    /// Creates a sink with the default formatter and HTTP transport.
    pub fn new(config: SinkConfig) -> Result<Self, SinkError> {
        SlackSinkBuilder::new(config).build()
    }

    pub fn builder(config: SinkConfig) -> SlackSinkBuilder {
        SlackSinkBuilder::new(config)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the flush task on the current tokio runtime.
    pub fn start(&self) -> Result<(), SinkError> {
        let runtime = Handle::try_current().map_err(|_| SinkError::NoRuntime)?;

        let mut lifecycle = self.lifecycle();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Finished) {
            Lifecycle::Pending(scheduler) => {
                if self.cancel_token.is_cancelled() {
                    *lifecycle = Lifecycle::Pending(scheduler);
                    return Err(SinkError::Stopped);
                }
                self.state.store(SinkState::Accepting);
                *lifecycle = Lifecycle::Running(runtime.spawn(scheduler.run()));
                debug!("SLACK | Flush task started");
                Ok(())
            }
            Lifecycle::Running(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                Err(SinkError::AlreadyStarted)
            }
            Lifecycle::Finished => Err(SinkError::Stopped),
        }
    }

    /// Queues a record for delivery. Never blocks and never fails: records
    /// below the configured minimum level, emitted during shutdown or past
    /// the queue limit are counted and dropped.
    pub fn emit(&self, record: LogRecord) {
        if self.cancel_token.is_cancelled() {
            trace!("SLACK | Sink is shutting down, rejecting record");
            self.stats.record_rejected();
            return;
        }
        // The level switch is checked again at flush time.
        if record.severity < self.config.minimum_level {
            self.stats.record_filtered();
            return;
        }

        match self.queue.push(record) {
            Enqueue::Accepted { pending } => {
                self.stats.record_enqueued();
                if pending >= self.queue.batch_size() {
                    self.size_trigger.notify_one();
                }
            }
            Enqueue::Dropped => self.stats.record_dropped(),
            Enqueue::Rejected => {
                trace!("SLACK | Queue is closed, rejecting record");
                self.stats.record_rejected();
            }
        }
    }

    /// Stops accepting records, delivers everything still queued and waits
    /// for the flush task to finish. Calling it again waits for the same
    /// shutdown.
    pub async fn dispose(&self) {
        self.cancel_token.cancel();

        let lifecycle = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Finished);
        match lifecycle {
            Lifecycle::Running(handle) => {
                if let Err(e) = handle.await {
                    error!("SLACK | Flush task failed: {e}");
                    self.state.store(SinkState::Stopped);
                    self.drained.cancel();
                }
            }
            Lifecycle::Pending(mut scheduler) => scheduler.drain().await,
            Lifecycle::Finished => self.drained.cancelled().await,
        }
    }

    #[must_use]
    pub fn activation_switch(&self) -> ActivationSwitch {
        self.activation.clone()
    }

    #[must_use]
    pub fn level_switch(&self) -> LevelSwitch {
        self.level_switch.clone()
    }

    #[must_use]
    pub fn state(&self) -> SinkState {
        self.state.load()
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Number of records waiting to be flushed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for SlackSink {
    fn drop(&mut self) {
        // A running flush task drains on its own once cancelled.
        self.cancel_token.cancel();

        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(lifecycle, Lifecycle::Pending(_)) && !self.queue.is_empty() {
            warn!(
                "SLACK | Sink dropped with {} undelivered records",
                self.queue.len()
            );
        }
    }
}

/// Assembles a [`SlackSink`] with optional collaborators.
#[must_use]
pub struct SlackSinkBuilder {
    config: SinkConfig,
    formatter: Arc<dyn MessageFormatter>,
    transport: Option<Arc<dyn Transport>>,
    activation: ActivationSwitch,
    level_switch: LevelSwitch,
}

impl SlackSinkBuilder {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            formatter: Arc::new(DefaultFormatter),
            transport: None,
            activation: ActivationSwitch::default(),
            level_switch: LevelSwitch::default(),
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Replaces the reqwest transport built from the configuration.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares an existing switch, e.g. one also handed to an admin endpoint.
    pub fn activation_switch(mut self, activation: ActivationSwitch) -> Self {
        self.activation = activation;
        self
    }

    pub fn level_switch(mut self, level_switch: LevelSwitch) -> Self {
        self.level_switch = level_switch;
        self
    }

    pub fn build(self) -> Result<SlackSink, SinkError> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(config.connection_timeout)));
        let queue = Arc::new(BatchQueue::new(
            config.batch.batch_size_limit,
            config.batch.queue_limit,
        ));
        let size_trigger = Arc::new(Notify::new());
        let state = Arc::new(SchedulerState::new());
        let stats = Arc::new(SinkStats::default());
        let cancel_token = CancellationToken::new();
        let drained = CancellationToken::new();

        let scheduler = BatchScheduler::new(SchedulerParts {
            config: Arc::clone(&config),
            queue: Arc::clone(&queue),
            formatter: self.formatter,
            delivery: DeliveryClient::new(
                transport,
                config.webhook_url.clone(),
                config.connection_timeout,
            ),
            activation: self.activation.clone(),
            level_switch: self.level_switch.clone(),
            size_trigger: Arc::clone(&size_trigger),
            cancel_token: cancel_token.clone(),
            drained: drained.clone(),
            state: Arc::clone(&state),
            stats: Arc::clone(&stats),
        });

        Ok(SlackSink {
            config,
            queue,
            size_trigger,
            activation: self.activation,
            level_switch: self.level_switch,
            state,
            stats,
            cancel_token,
            drained,
            lifecycle: Mutex::new(Lifecycle::Pending(scheduler)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use crate::record::Severity;
    use crate::test_support::RecordingTransport;
    use std::time::Duration;
    use tracing_test::traced_test;

    const URL: &str = "https://hooks.slack.com/services/T000/B000/XXXX";

    fn sink(config: SinkConfig) -> (SlackSink, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let sink = SlackSink::builder(config)
            .transport(transport.clone())
            .build()
            .unwrap();
        (sink, transport)
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = SinkConfig::builder(URL).build().unwrap();
        config.webhook_url = " ".to_string();

        assert!(matches!(
            SlackSink::new(config),
            Err(SinkError::Config(ConfigError::MissingWebhookUrl))
        ));
    }

    #[test]
    fn test_start_without_runtime() {
        let (sink, _) = sink(SinkConfig::builder(URL).build().unwrap());
        assert!(matches!(sink.start(), Err(SinkError::NoRuntime)));
        assert_eq!(sink.state(), SinkState::Idle);
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (sink, _) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.start().unwrap();
        assert_eq!(sink.state(), SinkState::Accepting);
        assert!(matches!(sink.start(), Err(SinkError::AlreadyStarted)));
        sink.dispose().await;
        assert!(matches!(sink.start(), Err(SinkError::Stopped)));
    }

    #[tokio::test]
    async fn test_size_trigger_flushes_before_period() {
        let config = SinkConfig::builder(URL)
            .batch_size_limit(2)
            .period(Duration::from_secs(60))
            .build()
            .unwrap();
        let (sink, transport) = sink(config);
        sink.start().unwrap();

        sink.emit(LogRecord::new(Severity::Information, "one"));
        sink.emit(LogRecord::new(Severity::Information, "two"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.texts(), vec!["one", "two"]);
        sink.dispose().await;
    }

    #[tokio::test]
    async fn test_emit_before_start_is_buffered() {
        let (sink, transport) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.emit(LogRecord::new(Severity::Warning, "early"));
        assert_eq!(sink.pending(), 1);

        sink.dispose().await;

        assert_eq!(transport.texts(), vec!["early"]);
        assert_eq!(sink.state(), SinkState::Stopped);
    }

    #[tokio::test]
    async fn test_emit_after_dispose_is_rejected() {
        let (sink, transport) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.start().unwrap();
        sink.dispose().await;

        sink.emit(LogRecord::new(Severity::Error, "too late"));

        assert!(transport.posts().is_empty());
        assert_eq!(sink.stats().rejected, 1);
        assert_eq!(sink.pending(), 0);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (sink, transport) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.start().unwrap();
        sink.emit(LogRecord::new(Severity::Information, "last words"));

        tokio::join!(sink.dispose(), sink.dispose());
        sink.dispose().await;

        assert_eq!(transport.texts(), vec!["last words"]);
        assert_eq!(sink.state(), SinkState::Stopped);
    }

    #[tokio::test]
    async fn test_queue_overflow_is_counted() {
        let config = SinkConfig::builder(URL)
            .batch_size_limit(10)
            .queue_limit(2)
            .build()
            .unwrap();
        let (sink, transport) = sink(config);
        for message in ["a", "b", "c"] {
            sink.emit(LogRecord::new(Severity::Information, message));
        }

        let stats = sink.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped, 1);

        sink.dispose().await;
        assert_eq!(transport.texts(), vec!["a", "b"]);
    }

    #[test]
    fn test_records_below_minimum_level_take_no_queue_slot() {
        let config = SinkConfig::builder(URL)
            .minimum_level(Severity::Warning)
            .queue_limit(1)
            .build()
            .unwrap();
        let (sink, _) = sink(config);

        sink.emit(LogRecord::new(Severity::Verbose, "noise"));
        sink.emit(LogRecord::new(Severity::Error, "signal"));

        assert_eq!(sink.pending(), 1);
        let stats = sink.stats();
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn test_emit_racing_drain_is_rejected() {
        let (sink, transport) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.emit(LogRecord::new(Severity::Information, "queued"));
        sink.dispose().await;

        // A producer that passed the shutdown check before cancellation
        // reaches the queue only after the drain closed it.
        assert_eq!(
            sink.queue.push(LogRecord::new(Severity::Information, "straggler")),
            Enqueue::Rejected
        );
        assert_eq!(sink.pending(), 0);
        assert_eq!(transport.texts(), vec!["queued"]);
    }

    #[test]
    #[traced_test]
    fn test_drop_before_start_warns_about_undelivered_records() {
        let (sink, _) = sink(SinkConfig::builder(URL).build().unwrap());
        sink.emit(LogRecord::new(Severity::Error, "never sent"));
        sink.emit(LogRecord::new(Severity::Error, "also never sent"));

        drop(sink);

        assert!(logs_contain("SLACK | Sink dropped with 2 undelivered records"));
    }

    #[tokio::test]
    async fn test_shared_switches() {
        let activation = ActivationSwitch::default();
        let transport = Arc::new(RecordingTransport::default());
        let sink = SlackSink::builder(SinkConfig::builder(URL).build().unwrap())
            .transport(transport.clone())
            .activation_switch(activation.clone())
            .build()
            .unwrap();

        activation.deactivate();
        assert!(!sink.activation_switch().is_active());

        sink.emit(LogRecord::new(Severity::Fatal, "muted"));
        sink.dispose().await;

        assert!(transport.posts().is_empty());
        assert_eq!(sink.stats().discarded, 1);
    }
}
