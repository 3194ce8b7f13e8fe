// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_ATTACHMENT_COLORS, DEFAULT_ATTACHMENT_FOOTER_ICONS, DEFAULT_BATCH_SIZE_LIMIT,
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_FLUSH_PERIOD, DEFAULT_QUEUE_LIMIT, ENV_BATCH_SIZE_LIMIT,
    ENV_CHANNELS, ENV_CONNECTION_TIMEOUT_MS, ENV_FLUSH_PERIOD_MS, ENV_ICON_EMOJI, ENV_ICON_URL,
    ENV_MINIMUM_LEVEL, ENV_OUTPUT_TEMPLATE, ENV_QUEUE_LIMIT, ENV_USERNAME, ENV_WEBHOOK_URL,
};
use crate::errors::ConfigError;
use crate::record::Severity;
use crate::template::OutputTemplate;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// A value for every severity. Built only from complete input, so lookups
/// can't miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityMap<T> {
    entries: [T; 6],
}

impl<T> SeverityMap<T> {
    pub fn from_fn(mut f: impl FnMut(Severity) -> T) -> Self {
        Self {
            entries: Severity::ALL.map(&mut f),
        }
    }

    /// Builds a map from `(severity, value)` pairs. Later pairs win. Fails when
    /// a severity has no value; `map` names the map in the error.
    pub fn try_from_entries(
        map: &'static str,
        entries: impl IntoIterator<Item = (Severity, T)>,
    ) -> Result<Self, ConfigError> {
        let mut slots: [Option<T>; 6] = Default::default();
        for (severity, value) in entries {
            slots[severity.index()] = Some(value);
        }

        let missing: Vec<Severity> = Severity::ALL
            .into_iter()
            .filter(|severity| slots[severity.index()].is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::IncompleteSeverityMap { map, missing });
        }

        let values: Vec<T> = slots.into_iter().flatten().collect();
        let entries: [T; 6] = values
            .try_into()
            .map_err(|_| ConfigError::IncompleteSeverityMap { map, missing: Vec::new() })?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, severity: Severity) -> &T {
        &self.entries[severity.index()]
    }
}

/// Slack's `parse` message option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    None,
    Full,
}

/// Which attachments are added to a message, and whether their fields are
/// displayed side by side (`compact`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentOptions {
    pub short_info: bool,
    pub short_info_compact: bool,
    pub extended_info: bool,
    pub extended_info_compact: bool,
    pub exception: bool,
    pub exception_compact: bool,
}

impl Default for AttachmentOptions {
    fn default() -> Self {
        Self {
            short_info: true,
            short_info_compact: true,
            extended_info: false,
            extended_info_compact: true,
            exception: true,
            exception_compact: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of records processed per flush.
    pub batch_size_limit: usize,
    /// Time between periodic flushes.
    pub period: Duration,
    /// Maximum number of queued records; newer records are dropped past it.
    pub queue_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size_limit: DEFAULT_BATCH_SIZE_LIMIT,
            period: DEFAULT_FLUSH_PERIOD,
            queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

/// Configuration of a [`crate::sink::SlackSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Slack incoming webhook URL
    pub webhook_url: String,
    /// Channels to post every message to. Empty posts once to the webhook's
    /// default channel.
    pub channels: Vec<String>,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
    pub delete_original: bool,
    pub replace_original: bool,
    pub link_names: bool,
    pub markdown: bool,
    pub parse: ParseMode,
    pub response_type: Option<String>,
    pub thread_id: Option<String>,
    pub attachment_colors: SeverityMap<String>,
    pub attachment_footer_icons: SeverityMap<Option<String>>,
    pub attachments: AttachmentOptions,
    pub connection_timeout: Duration,
    pub batch: BatchOptions,
    /// Records below this severity are never sent.
    pub minimum_level: Severity,
    pub output_template: OutputTemplate,
}

impl SinkConfig {
    /// Starts a builder with every optional setting at its default.
    pub fn builder(webhook_url: impl Into<String>) -> SinkConfigBuilder {
        SinkConfigBuilder::new(webhook_url)
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let webhook_url = lookup(ENV_WEBHOOK_URL).unwrap_or_default();
        let mut builder = SinkConfigBuilder::new(webhook_url);

        if let Some(channels) = lookup(ENV_CHANNELS) {
            builder = builder.channels(
                channels
                    .split(',')
                    .map(str::trim)
                    .filter(|channel| !channel.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            builder = builder.username(username);
        }
        if let Some(icon_emoji) = lookup(ENV_ICON_EMOJI) {
            builder = builder.icon_emoji(icon_emoji);
        }
        if let Some(icon_url) = lookup(ENV_ICON_URL) {
            builder = builder.icon_url(icon_url);
        }
        if let Some(template) = lookup(ENV_OUTPUT_TEMPLATE) {
            builder = builder.output_template(&template);
        }
        if let Some(level) = parse_env::<Severity>(&lookup, ENV_MINIMUM_LEVEL) {
            builder = builder.minimum_level(level);
        }
        if let Some(size) = parse_env::<usize>(&lookup, ENV_BATCH_SIZE_LIMIT) {
            builder = builder.batch_size_limit(size);
        }
        if let Some(period) = parse_env::<u64>(&lookup, ENV_FLUSH_PERIOD_MS) {
            builder = builder.period(Duration::from_millis(period));
        }
        if let Some(limit) = parse_env::<usize>(&lookup, ENV_QUEUE_LIMIT) {
            builder = builder.queue_limit(limit);
        }
        if let Some(timeout) = parse_env::<u64>(&lookup, ENV_CONNECTION_TIMEOUT_MS) {
            builder = builder.connection_timeout(Duration::from_millis(timeout));
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.webhook_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::InvalidWebhookUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidWebhookUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        if self.batch.batch_size_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "batch size limit must be greater than 0".to_string(),
            ));
        }
        if self.batch.queue_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "queue limit must be greater than 0".to_string(),
            ));
        }
        if self.batch.period.is_zero() {
            return Err(ConfigError::InvalidValue(
                "flush period must be greater than 0".to_string(),
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "connection timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("SLACK | Ignoring {key}: can't parse '{raw}', using the default");
            None
        }
    }
}

/// Collects optional settings and produces a validated [`SinkConfig`].
#[derive(Debug, Clone)]
#[must_use]
pub struct SinkConfigBuilder {
    webhook_url: String,
    channels: Vec<String>,
    username: Option<String>,
    icon_emoji: Option<String>,
    icon_url: Option<String>,
    delete_original: bool,
    replace_original: bool,
    link_names: bool,
    markdown: bool,
    parse: ParseMode,
    response_type: Option<String>,
    thread_id: Option<String>,
    attachment_colors: Option<Vec<(Severity, String)>>,
    attachment_footer_icons: Option<Vec<(Severity, Option<String>)>>,
    attachments: AttachmentOptions,
    connection_timeout: Duration,
    batch: BatchOptions,
    minimum_level: Severity,
    output_template: OutputTemplate,
}

impl SinkConfigBuilder {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            channels: Vec::new(),
            username: None,
            icon_emoji: None,
            icon_url: None,
            delete_original: false,
            replace_original: false,
            link_names: false,
            markdown: false,
            parse: ParseMode::None,
            response_type: None,
            thread_id: None,
            attachment_colors: None,
            attachment_footer_icons: None,
            attachments: AttachmentOptions::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            batch: BatchOptions::default(),
            minimum_level: Severity::Verbose,
            output_template: OutputTemplate::default(),
        }
    }

    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn icon_emoji(mut self, icon_emoji: impl Into<String>) -> Self {
        self.icon_emoji = Some(icon_emoji.into());
        self
    }

    pub fn icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    pub fn delete_original(mut self, enabled: bool) -> Self {
        self.delete_original = enabled;
        self
    }

    pub fn replace_original(mut self, enabled: bool) -> Self {
        self.replace_original = enabled;
        self
    }

    pub fn link_names(mut self, enabled: bool) -> Self {
        self.link_names = enabled;
        self
    }

    pub fn markdown(mut self, enabled: bool) -> Self {
        self.markdown = enabled;
        self
    }

    pub fn parse(mut self, parse: ParseMode) -> Self {
        self.parse = parse;
        self
    }

    pub fn response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = Some(response_type.into());
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Replaces the color table. Must name every severity.
    pub fn attachment_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = (Severity, S)>,
        S: Into<String>,
    {
        self.attachment_colors = Some(colors.into_iter().map(|(k, v)| (k, v.into())).collect());
        self
    }

    /// Replaces the footer icon table. Must name every severity; `None` means
    /// no icon.
    pub fn attachment_footer_icons<I>(mut self, icons: I) -> Self
    where
        I: IntoIterator<Item = (Severity, Option<String>)>,
    {
        self.attachment_footer_icons = Some(icons.into_iter().collect());
        self
    }

    pub fn attachments(mut self, attachments: AttachmentOptions) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn short_info_attachment(mut self, enabled: bool, compact: bool) -> Self {
        self.attachments.short_info = enabled;
        self.attachments.short_info_compact = compact;
        self
    }

    pub fn extended_info_attachment(mut self, enabled: bool, compact: bool) -> Self {
        self.attachments.extended_info = enabled;
        self.attachments.extended_info_compact = compact;
        self
    }

    pub fn exception_attachment(mut self, enabled: bool, compact: bool) -> Self {
        self.attachments.exception = enabled;
        self.attachments.exception_compact = compact;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn batch_size_limit(mut self, limit: usize) -> Self {
        self.batch.batch_size_limit = limit;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.batch.period = period;
        self
    }

    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.batch.queue_limit = limit;
        self
    }

    pub fn minimum_level(mut self, level: Severity) -> Self {
        self.minimum_level = level;
        self
    }

    pub fn output_template(mut self, template: &str) -> Self {
        self.output_template = OutputTemplate::parse(template);
        self
    }

    pub fn build(self) -> Result<SinkConfig, ConfigError> {
        let attachment_colors = match self.attachment_colors {
            Some(entries) => SeverityMap::try_from_entries("attachment_colors", entries)?,
            None => SeverityMap::from_fn(|s| DEFAULT_ATTACHMENT_COLORS[s.index()].to_string()),
        };
        let attachment_footer_icons = match self.attachment_footer_icons {
            Some(entries) => SeverityMap::try_from_entries("attachment_footer_icons", entries)?,
            None => SeverityMap::from_fn(|s| {
                DEFAULT_ATTACHMENT_FOOTER_ICONS[s.index()].map(str::to_string)
            }),
        };

        let config = SinkConfig {
            webhook_url: self.webhook_url.trim().to_string(),
            channels: self
                .channels
                .into_iter()
                .map(|channel| channel.trim().to_string())
                .filter(|channel| !channel.is_empty())
                .collect(),
            username: self.username,
            icon_emoji: self.icon_emoji,
            icon_url: self.icon_url,
            delete_original: self.delete_original,
            replace_original: self.replace_original,
            link_names: self.link_names,
            markdown: self.markdown,
            parse: self.parse,
            response_type: self.response_type,
            thread_id: self.thread_id,
            attachment_colors,
            attachment_footer_icons,
            attachments: self.attachments,
            connection_timeout: self.connection_timeout,
            batch: self.batch,
            minimum_level: self.minimum_level,
            output_template: self.output_template,
        };

        config.validate()?;
        Ok(config)
    }
}
