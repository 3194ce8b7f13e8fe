// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records consumed by the sink.
//!
//! A [`LogRecord`] is produced by the host's logging framework for every log
//! call and handed to the sink by value. The sink never mutates it.

use crate::errors::ParseSeverityError;
use chrono::{DateTime, FixedOffset, Utc};
use derive_more::Display;
use std::fmt::{self, Write};
use std::str::FromStr;

/// Ordered log severity, lowest first.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Verbose = 0,
    Debug = 1,
    Information = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Verbose,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Three letter upper case name, e.g. `INF`.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Severity::Verbose => "VRB",
            Severity::Debug => "DBG",
            Severity::Information => "INF",
            Severity::Warning => "WRN",
            Severity::Error => "ERR",
            Severity::Fatal => "FTL",
        }
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" | "trace" | "vrb" => Ok(Severity::Verbose),
            "debug" | "dbg" => Ok(Severity::Debug),
            "information" | "info" | "inf" => Ok(Severity::Information),
            "warning" | "warn" | "wrn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            "fatal" | "critical" | "ftl" => Ok(Severity::Fatal),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// A structured property value attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Sequence(Vec<PropertyValue>),
    Structure(Vec<(String, PropertyValue)>),
}

impl PropertyValue {
    /// Renders the value as text. Strings are quoted unless `literal` is set;
    /// nested strings are always quoted.
    #[must_use]
    pub fn render(&self, literal: bool) -> String {
        let mut out = String::new();
        self.render_into(&mut out, literal);
        out
    }

    fn render_into(&self, out: &mut String, literal: bool) {
        match self {
            PropertyValue::Null => out.push_str("null"),
            PropertyValue::Bool(value) => {
                let _ = write!(out, "{value}");
            }
            PropertyValue::Int(value) => {
                let _ = write!(out, "{value}");
            }
            PropertyValue::UInt(value) => {
                let _ = write!(out, "{value}");
            }
            PropertyValue::Float(value) => {
                let _ = write!(out, "{value}");
            }
            PropertyValue::Str(value) if literal => out.push_str(value),
            PropertyValue::Str(value) => {
                out.push('"');
                for ch in value.chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            }
            PropertyValue::Sequence(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out, false);
                }
                out.push(']');
            }
            PropertyValue::Structure(fields) => {
                out.push_str("{ ");
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(": ");
                    value.render_into(out, false);
                }
                if !fields.is_empty() {
                    out.push(' ');
                }
                out.push('}');
            }
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::UInt(u64::from(value))
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::UInt(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::Sequence(items)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PropertyValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    PropertyValue::UInt(u)
                } else {
                    PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => PropertyValue::Str(s),
            serde_json::Value::Array(items) => {
                PropertyValue::Sequence(items.into_iter().map(PropertyValue::from).collect())
            }
            serde_json::Value::Object(map) => PropertyValue::Structure(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Error carried by a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub type_name: String,
    pub stack_trace: Option<String>,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            type_name: type_name.into(),
            stack_trace: None,
        }
    }

    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Captures a Rust error. The type name is the unqualified name of `E` and
    /// the `source()` chain becomes the stack trace text.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let full_name = std::any::type_name::<E>();
        let without_generics = full_name.split('<').next().unwrap_or(full_name);
        let type_name = without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
            .to_string();

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("   --> caused by: {cause}"));
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            type_name,
            stack_trace: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;
        if let Some(stack_trace) = &self.stack_trace {
            write!(f, "\n{stack_trace}")?;
        }
        Ok(())
    }
}

/// One log event as produced by the host's logging framework.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub severity: Severity,
    pub rendered_message: String,
    pub properties: Vec<(String, PropertyValue)>,
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    /// Creates a record timestamped now (UTC) with no properties.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().fixed_offset(),
            severity,
            rendered_message: message.into(),
            properties: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a property, replacing an existing one with the same name in place.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
