// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::SendError;
use crate::message::SlackMessage;
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Posts one message to one webhook URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), SendError>;
}

/// Where a message was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The channel the webhook was created for.
    Default,
    Channel(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Default => f.write_str("default channel"),
            Destination::Channel(channel) => f.write_str(channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub destination: Destination,
    pub outcome: Result<(), SendError>,
}

impl DeliveryResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Sends messages to the webhook, fanning out when channels are configured.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn Transport>,
    webhook_url: String,
    timeout: Duration,
}

impl DeliveryClient {
    pub fn new(transport: Arc<dyn Transport>, webhook_url: String, timeout: Duration) -> Self {
        Self {
            transport,
            webhook_url,
            timeout,
        }
    }

    /// Posts `message` once when `channels` is empty, otherwise once per
    /// channel concurrently. Every post runs to completion; one failure never
    /// cancels the others. Results follow the order of `channels`.
    pub async fn send(&self, message: &SlackMessage, channels: &[String]) -> Vec<DeliveryResult> {
        if channels.is_empty() {
            return vec![DeliveryResult {
                destination: Destination::Default,
                outcome: self.post(message).await,
            }];
        }

        let posts = channels.iter().map(|channel| async move {
            let message = message.for_channel(channel);
            DeliveryResult {
                destination: Destination::Channel(channel.clone()),
                outcome: self.post(&message).await,
            }
        });
        join_all(posts).await
    }

    async fn post(&self, message: &SlackMessage) -> Result<(), SendError> {
        let start = std::time::Instant::now();
        let result = match tokio::time::timeout(
            self.timeout,
            self.transport.post(&self.webhook_url, message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(self.timeout)),
        };
        let destination = message.channel.as_deref().unwrap_or("default channel");
        let elapsed = start.elapsed().as_millis();
        match &result {
            Ok(()) => debug!("SLACK | Posted message to {destination} in {elapsed} ms"),
            Err(e) => debug!(
                "SLACK | Failed to post message to {destination} after {elapsed} ms: {e}"
            ),
        }
        result
    }
}
