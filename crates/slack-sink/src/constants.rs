// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default values for the sink configuration.

use std::time::Duration;

/// Output template applied to every record when none is configured.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{Message:lj}";

/// Maximum number of records handed to the formatter in one flush.
pub const DEFAULT_BATCH_SIZE_LIMIT: usize = 10;

/// Time between two periodic flushes.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(2);

/// Maximum number of records waiting in the queue. Records arriving while the
/// queue is full are dropped.
pub const DEFAULT_QUEUE_LIMIT: usize = 10_000;

/// Upper bound for a single webhook request, connect included.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timestamp format used for attachment fields and fallbacks, and for
/// `{Timestamp}` tokens without an explicit format.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

/// Widest padding a template token may request, in either direction.
pub const MAX_TEMPLATE_ALIGNMENT: i32 = 1024;

/// Title of the level/timestamp or properties attachment.
pub const INFO_ATTACHMENT_TITLE: &str = "Details";

/// Title of the attachment describing a record's error.
pub const EXCEPTION_ATTACHMENT_TITLE: &str = "Exception";

// Attachment colors, indexed by severity (Verbose..Fatal)
pub const DEFAULT_ATTACHMENT_COLORS: [&str; 6] = [
    "#DFDFDF", "#00C9FF", "#45FF00", "#FF7200", "#FF0000", "#900000",
];

// Attachment footer icons, indexed by severity (Verbose..Fatal)
pub const DEFAULT_ATTACHMENT_FOOTER_ICONS: [Option<&str>; 6] = [
    None,
    Some(":bug:"),
    Some(":information_source:"),
    Some(":warning:"),
    Some(":bomb:"),
    Some(":fire:"),
];

// Environment variables read by `SinkConfig::from_env`
pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const ENV_CHANNELS: &str = "SLACK_CHANNELS";
pub const ENV_USERNAME: &str = "SLACK_USERNAME";
pub const ENV_ICON_EMOJI: &str = "SLACK_ICON_EMOJI";
pub const ENV_ICON_URL: &str = "SLACK_ICON_URL";
pub const ENV_MINIMUM_LEVEL: &str = "SLACK_MINIMUM_LEVEL";
pub const ENV_OUTPUT_TEMPLATE: &str = "SLACK_OUTPUT_TEMPLATE";
pub const ENV_BATCH_SIZE_LIMIT: &str = "SLACK_BATCH_SIZE_LIMIT";
pub const ENV_FLUSH_PERIOD_MS: &str = "SLACK_FLUSH_PERIOD_MS";
pub const ENV_QUEUE_LIMIT: &str = "SLACK_QUEUE_LIMIT";
pub const ENV_CONNECTION_TIMEOUT_MS: &str = "SLACK_CONNECTION_TIMEOUT_MS";
