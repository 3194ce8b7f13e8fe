// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::Severity;
use std::time::Duration;

/// Errors raised while building or validating a [`crate::config::SinkConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("The Slack webhook URL can't be empty")]
    MissingWebhookUrl,

    #[error("Invalid Slack webhook URL '{url}': {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("Severity map '{map}' has no entry for {missing:?}")]
    IncompleteSeverityMap {
        map: &'static str,
        missing: Vec<Severity>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Errors raised while turning a record into a Slack message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Formatter options are not a sink configuration")]
    TypeMismatch,

    #[error("Formatter failed: {0}")]
    Custom(String),
}

/// Errors raised while posting one message to one destination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("{status}: Slack rejected the message: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the sink lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available to run the flush task")]
    NoRuntime,

    #[error("Sink already started")]
    AlreadyStarted,

    #[error("Sink is shutting down")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown severity '{0}'")]
pub struct ParseSeverityError(pub String);
