// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock transports for testing

use slack_sink::{delivery::Transport, errors::SendError, message::SlackMessage};
use std::collections::HashSet;
use std::sync::Mutex;

/// Mock transport that records every post and fails for selected channels
#[derive(Default)]
pub struct MockTransport {
    posts: Mutex<Vec<SlackMessage>>,
    failing_channels: HashSet<String>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn failing_for(channels: &[&str]) -> Self {
        Self {
            failing_channels: channels.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn posts(&self) -> Vec<SlackMessage> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|m| m.text).collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn post(&self, _url: &str, message: &SlackMessage) -> Result<(), SendError> {
        self.posts.lock().unwrap().push(message.clone());
        match &message.channel {
            Some(channel) if self.failing_channels.contains(channel) => {
                Err(SendError::Transport("connection reset".to_string()))
            }
            _ => Ok(()),
        }
    }
}
