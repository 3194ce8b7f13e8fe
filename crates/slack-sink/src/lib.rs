// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batched log sink that posts log records to Slack incoming webhooks.
//!
//! Records are handed to [`sink::SlackSink::emit`] from any thread. They are
//! queued without blocking, grouped into batches by a background flush task,
//! formatted into Slack messages and posted to the configured webhook (and
//! optionally fanned out to several channels).
//!
//! ```rust,ignore
//! use slack_sink::{config::SinkConfig, record::{LogRecord, Severity}, sink::SlackSink};
//!
//! let config = SinkConfig::builder("https://hooks.slack.com/services/T000/B000/XXXX")
//!     .username("alerts")
//!     .minimum_level(Severity::Warning)
//!     .build()?;
//! let sink = SlackSink::new(config)?;
//! sink.start()?;
//! sink.emit(LogRecord::new(Severity::Error, "payment service unreachable"));
//! sink.dispose().await;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod errors;
pub mod flusher;
pub mod formatter;
pub mod http;
pub mod message;
pub mod record;
pub mod sink;
pub mod stats;
pub mod switch;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;
