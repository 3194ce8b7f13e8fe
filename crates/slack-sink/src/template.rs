// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Output templates used to render the text of a Slack message.
//!
//! A template is plain text with `{Name[,alignment][:format]}` tokens. `{{` and
//! `}}` produce literal braces. The following names are built in:
//!
//! - `Message`: the record's rendered message
//! - `Timestamp`: the record timestamp, `format` is a strftime string
//! - `Level`: the severity, formats `u3`, `w3`, `t3`, `u` and `w`
//! - `NewLine`: a line break
//! - `Exception`: the record's error followed by a line break, or nothing
//! - `Properties`: every property not referenced elsewhere in the template
//!
//! Any other name renders the record property with that name. Strings are
//! quoted unless the format contains `l`. Tokens naming a property the record
//! doesn't carry are emitted unchanged.

use crate::constants::{
    DEFAULT_OUTPUT_TEMPLATE, DEFAULT_TIMESTAMP_FORMAT, MAX_TEMPLATE_ALIGNMENT,
};
use crate::record::{LogRecord, PropertyValue, Severity};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::collections::HashSet;
use std::fmt::{self, Write};
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
    TOKEN_REGEX.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let regex = Regex::new(
            r"\{\{|\}\}|\{[@$]?([A-Za-z_][A-Za-z0-9_]*)(?:,(-?[0-9]+))?(?::([^{}]+))?\}",
        )
        .expect("token pattern is valid");
        regex
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Property {
        name: String,
        alignment: Option<i32>,
        format: Option<String>,
        raw: String,
    },
}

/// A parsed output template. Parsing never fails: anything that isn't a
/// well-formed token is kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    source: String,
    tokens: Vec<Token>,
    referenced: HashSet<String>,
}

impl OutputTemplate {
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let mut tokens = Vec::new();
        let mut referenced = HashSet::new();
        let mut text = String::new();
        let mut last = 0;

        for captures in token_regex().captures_iter(template) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            text.push_str(&template[last..whole.start()]);
            last = whole.end();

            match whole.as_str() {
                "{{" => text.push('{'),
                "}}" => text.push('}'),
                raw => {
                    let Some(name) = captures.get(1) else {
                        text.push_str(raw);
                        continue;
                    };
                    if !text.is_empty() {
                        tokens.push(Token::Text(std::mem::take(&mut text)));
                    }
                    referenced.insert(name.as_str().to_string());
                    tokens.push(Token::Property {
                        name: name.as_str().to_string(),
                        alignment: captures
                            .get(2)
                            .and_then(|m| m.as_str().parse::<i32>().ok())
                            .map(|w| w.clamp(-MAX_TEMPLATE_ALIGNMENT, MAX_TEMPLATE_ALIGNMENT)),
                        format: captures.get(3).map(|m| m.as_str().to_string()),
                        raw: raw.to_string(),
                    });
                }
            }
        }
        text.push_str(&template[last..]);
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }

        Self {
            source: template.to_string(),
            tokens,
            referenced,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(record.rendered_message.len() + 16);
        for token in &self.tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Property {
                    name,
                    alignment,
                    format,
                    raw,
                } => match self.render_property(name, format.as_deref(), record) {
                    Some(value) => push_aligned(&mut out, &value, *alignment),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }

    fn render_property(&self, name: &str, format: Option<&str>, record: &LogRecord) -> Option<String> {
        match name {
            "Message" => Some(record.rendered_message.clone()),
            "Timestamp" => Some(format_timestamp(&record.timestamp, format)),
            "Level" => Some(format_level(record.severity, format)),
            "NewLine" => Some("\n".to_string()),
            "Exception" => Some(
                record
                    .error
                    .as_ref()
                    .map(|error| format!("{error}\n"))
                    .unwrap_or_default(),
            ),
            "Properties" => {
                let remaining = record
                    .properties
                    .iter()
                    .filter(|(key, _)| !self.referenced.contains(key))
                    .cloned()
                    .collect();
                Some(PropertyValue::Structure(remaining).render(false))
            }
            _ => {
                let literal = format.is_some_and(|f| f.contains('l'));
                record.property(name).map(|value| value.render(literal))
            }
        }
    }
}

impl Default for OutputTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_OUTPUT_TEMPLATE)
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Formats a timestamp with a strftime `format`, falling back to
/// [`DEFAULT_TIMESTAMP_FORMAT`] when none is given or the format is invalid.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>, format: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(format) = format {
        if write!(out, "{}", timestamp.format(format)).is_ok() {
            return out;
        }
        out.clear();
    }
    let _ = write!(out, "{}", timestamp.format(DEFAULT_TIMESTAMP_FORMAT));
    out
}

fn format_level(severity: Severity, format: Option<&str>) -> String {
    match format {
        Some("u3") => severity.short_name().to_string(),
        Some("w3") => severity.short_name().to_ascii_lowercase(),
        Some("t3") => {
            let short = severity.short_name();
            format!("{}{}", &short[..1], short[1..].to_ascii_lowercase())
        }
        Some("u") => severity.to_string().to_ascii_uppercase(),
        Some("w") => severity.to_string().to_ascii_lowercase(),
        _ => severity.to_string(),
    }
}

// Positive alignment pads on the left, negative on the right.
fn push_aligned(out: &mut String, value: &str, alignment: Option<i32>) {
    let Some(width) = alignment.filter(|w| *w != 0) else {
        out.push_str(value);
        return;
    };
    let target = width.unsigned_abs() as usize;
    let len = value.chars().count();
    if len >= target {
        out.push_str(value);
        return;
    }
    let padding = " ".repeat(target - len);
    if width > 0 {
        out.push_str(&padding);
        out.push_str(value);
    } else {
        out.push_str(value);
        out.push_str(&padding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ErrorInfo;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn record() -> LogRecord {
        let timestamp = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .unwrap();
        LogRecord::new(Severity::Warning, "disk almost full")
            .with_timestamp(timestamp)
            .with_property("Host", "db-1")
            .with_property("Usage", 93)
    }

    #[test]
    fn test_default_template_renders_message() {
        assert_eq!(OutputTemplate::default().render(&record()), "disk almost full");
        assert_eq!(OutputTemplate::default().as_str(), "{Message:lj}");
    }

    #[test]
    fn test_builtin_tokens() {
        let template = OutputTemplate::parse("[{Timestamp:%H:%M:%S} {Level:u3}] {Message}{NewLine}");
        assert_eq!(template.render(&record()), "[14:05:07 WRN] disk almost full\n");
    }

    #[test]
    fn test_level_formats() {
        let record = record();
        let render = |t: &str| OutputTemplate::parse(t).render(&record);
        assert_eq!(render("{Level}"), "Warning");
        assert_eq!(render("{Level:w3}"), "wrn");
        assert_eq!(render("{Level:t3}"), "Wrn");
        assert_eq!(render("{Level:u}"), "WARNING");
        assert_eq!(render("{Level:w}"), "warning");
    }

    #[test]
    fn test_default_timestamp_format() {
        let template = OutputTemplate::parse("{Timestamp}");
        assert_eq!(template.render(&record()), "2024-03-09 14:05:07.000 +02:00");
    }

    #[test]
    fn test_invalid_timestamp_format_falls_back() {
        let template = OutputTemplate::parse("{Timestamp:%Q}");
        assert_eq!(template.render(&record()), "2024-03-09 14:05:07.000 +02:00");
    }

    #[test]
    fn test_properties_and_literal_format() {
        let record = record();
        assert_eq!(OutputTemplate::parse("{Host}").render(&record), "\"db-1\"");
        assert_eq!(OutputTemplate::parse("{Host:l}").render(&record), "db-1");
        assert_eq!(
            OutputTemplate::parse("{Host:l} {Properties}").render(&record),
            "db-1 { Usage: 93 }"
        );
    }

    #[test]
    fn test_unknown_property_is_kept_verbatim() {
        let template = OutputTemplate::parse("user={UserId,5:l}");
        assert_eq!(template.render(&record()), "user={UserId,5:l}");
    }

    #[test]
    fn test_escaped_braces_and_alignment() {
        let record = record();
        assert_eq!(
            OutputTemplate::parse("{{{Level,-9}}}|").render(&record),
            "{Warning  }|"
        );
        assert_eq!(OutputTemplate::parse("{Usage,5}").render(&record), "   93");
        assert_eq!(OutputTemplate::parse("{Usage,1}").render(&record), "93");
    }

    #[test]
    fn test_huge_alignment_is_clamped() {
        let record = record();
        let left = OutputTemplate::parse("{Usage,2000000000}").render(&record);
        assert_eq!(left.len(), MAX_TEMPLATE_ALIGNMENT as usize);
        assert!(left.ends_with(" 93"));

        let right = OutputTemplate::parse("{Host,-2000000000:l}").render(&record);
        assert_eq!(right.len(), MAX_TEMPLATE_ALIGNMENT as usize);
        assert!(right.starts_with("db-1 "));
    }

    #[test]
    fn test_exception_token() {
        let with_error = record().with_error(ErrorInfo::new("IoError", "broken pipe"));
        let template = OutputTemplate::parse("{Message}{NewLine}{Exception}");
        assert_eq!(
            template.render(&with_error),
            "disk almost full\nIoError: broken pipe\n"
        );
        assert_eq!(template.render(&record()), "disk almost full\n");
    }

    #[test]
    fn test_malformed_tokens_are_text() {
        let template = OutputTemplate::parse("{ not a token } {Message");
        assert_eq!(template.render(&record()), "{ not a token } {Message");
    }

    proptest! {
        #[test]
        fn test_text_without_braces_is_unchanged(text in "[^{}]*") {
            prop_assert_eq!(OutputTemplate::parse(&text).render(&record()), text);
        }

        #[test]
        fn test_arbitrary_templates_render(text in ".*") {
            let template = OutputTemplate::parse(&text);
            let _ = template.render(&record());
            prop_assert_eq!(template.as_str(), text.as_str());
        }
    }
}
