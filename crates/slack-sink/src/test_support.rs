// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::delivery::Transport;
use crate::errors::SendError;
use crate::message::SlackMessage;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Records every post. Posts to channels in `failing` are answered with a
/// 500 after being recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    posts: Mutex<Vec<(String, SlackMessage)>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn failing_for<'a>(channels: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: channels.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, SlackMessage)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|(_, m)| m.text).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), SendError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), message.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &message.channel {
            Some(channel) if self.failing.contains(channel) => Err(SendError::Status {
                status: 500,
                body: "internal_error".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
