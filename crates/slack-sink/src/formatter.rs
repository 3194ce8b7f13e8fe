// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a [`LogRecord`] into a [`SlackMessage`].

use crate::config::SinkConfig;
use crate::constants::{EXCEPTION_ATTACHMENT_TITLE, INFO_ATTACHMENT_TITLE};
use crate::errors::FormatError;
use crate::message::{Attachment, Block, Field, SlackMessage};
use crate::record::LogRecord;
use crate::template::format_timestamp;
use std::any::Any;

/// Strategy producing the parts of a Slack message for one record.
///
/// Implementations must be pure: formatting the same record with the same
/// configuration twice yields the same result.
pub trait MessageFormatter: Send + Sync {
    fn build_text(&self, record: &LogRecord, config: &SinkConfig) -> Result<String, FormatError>;

    /// `Ok(None)` when the record gets no attachment at all.
    fn build_attachments(
        &self,
        record: &LogRecord,
        config: &SinkConfig,
    ) -> Result<Option<Vec<Attachment>>, FormatError>;

    fn build_blocks(
        &self,
        _record: &LogRecord,
        _config: &SinkConfig,
    ) -> Result<Option<Vec<Block>>, FormatError> {
        Ok(None)
    }
}

/// Renders text through the configured output template and adds the info and
/// exception attachments enabled in the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl MessageFormatter for DefaultFormatter {
    fn build_text(&self, record: &LogRecord, config: &SinkConfig) -> Result<String, FormatError> {
        Ok(config.output_template.render(record))
    }

    fn build_attachments(
        &self,
        record: &LogRecord,
        config: &SinkConfig,
    ) -> Result<Option<Vec<Attachment>>, FormatError> {
        let options = &config.attachments;
        let mut attachments = Vec::new();

        if options.short_info && !options.extended_info {
            attachments.push(info_attachment(
                record,
                config,
                vec![
                    Field::new("Level", record.severity.to_string(), options.short_info_compact),
                    Field::new(
                        "Timestamp",
                        format_timestamp(&record.timestamp, None),
                        options.short_info_compact,
                    ),
                ],
            ));
        } else if options.extended_info {
            let fields = record
                .properties
                .iter()
                .map(|(name, value)| {
                    Field::new(name.as_str(), value.render(false), options.extended_info_compact)
                })
                .collect();
            attachments.push(info_attachment(record, config, fields));
        }

        if options.exception {
            if let Some(error) = &record.error {
                let stack_trace = error.stack_trace.as_deref().unwrap_or_default();
                attachments.push(Attachment {
                    fallback: format!(
                        "{} Exception: {} \n {}",
                        format_timestamp(&record.timestamp, None),
                        error.message,
                        stack_trace
                    ),
                    color: config.attachment_colors.get(record.severity).clone(),
                    title: EXCEPTION_ATTACHMENT_TITLE.to_string(),
                    fields: vec![
                        Field::new("Message", error.message.as_str(), options.exception_compact),
                        Field::new(
                            "Type",
                            format!("`{}`", error.type_name),
                            options.exception_compact,
                        ),
                        Field::new("Stack Trace", format!("```{stack_trace}```"), false),
                        Field::new("Exception", format!("```{error}```"), false),
                    ],
                    footer_icon: config.attachment_footer_icons.get(record.severity).clone(),
                    mrkdwn_in: Some(vec!["fields".to_string()]),
                });
            }
        }

        Ok((!attachments.is_empty()).then_some(attachments))
    }
}

fn info_attachment(record: &LogRecord, config: &SinkConfig, fields: Vec<Field>) -> Attachment {
    Attachment {
        fallback: format!(
            "{} [{}] - {}",
            format_timestamp(&record.timestamp, None),
            record.severity,
            record.rendered_message
        ),
        color: config.attachment_colors.get(record.severity).clone(),
        title: INFO_ATTACHMENT_TITLE.to_string(),
        fields,
        footer_icon: config.attachment_footer_icons.get(record.severity).clone(),
        mrkdwn_in: None,
    }
}

/// Builds the complete message for `record`. The channel is the first
/// configured channel; delivery readdresses it for each destination.
pub fn build_message(
    formatter: &dyn MessageFormatter,
    record: &LogRecord,
    config: &SinkConfig,
) -> Result<SlackMessage, FormatError> {
    Ok(SlackMessage {
        text: formatter.build_text(record, config)?,
        channel: config.channels.first().cloned(),
        username: config.username.clone(),
        icon_emoji: config.icon_emoji.clone(),
        icon_url: config.icon_url.clone(),
        attachments: formatter.build_attachments(record, config)?,
        blocks: formatter.build_blocks(record, config)?,
        markdown: config.markdown,
        link_names: config.link_names,
        parse: config.parse,
        delete_original: config.delete_original,
        replace_original: config.replace_original,
        response_type: config.response_type.clone(),
        thread_id: config.thread_id.clone(),
    })
}

fn downcast_config(options: &dyn Any) -> Result<&SinkConfig, FormatError> {
    options
        .downcast_ref::<SinkConfig>()
        .ok_or(FormatError::TypeMismatch)
}

/// [`DefaultFormatter::build_text`] for callers holding options as `Any`.
pub fn generate_text(record: &LogRecord, options: &dyn Any) -> Result<String, FormatError> {
    DefaultFormatter.build_text(record, downcast_config(options)?)
}

/// [`DefaultFormatter::build_attachments`] for callers holding options as `Any`.
pub fn generate_attachments(
    record: &LogRecord,
    options: &dyn Any,
) -> Result<Option<Vec<Attachment>>, FormatError> {
    DefaultFormatter.build_attachments(record, downcast_config(options)?)
}

pub fn generate_blocks(
    _record: &LogRecord,
    _options: &dyn Any,
) -> Result<Option<Vec<Block>>, FormatError> {
    Ok(None)
}
