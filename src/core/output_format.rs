//! Per-sink line encoders
//!
//! - Text: `[2025-01-08T10:30:45.123Z] INFO  Request processed user_id=123`
//! - Json: `{"level":"info","msg":"Request processed","time":"...","user_id":123}`
//! - Enriched: the flat event envelope, see [`EnrichedRecord::to_json_value`]

use super::enriched_record::{wire_time, EnrichedRecord, Event, LEVEL_KEY, MESSAGE_KEY, TIME_KEY};
use super::error::Result;
use super::log_context::FieldValue;
use super::log_record::LogRecord;
use crate::config::OutputFormat;
use colored::Colorize;
use serde_json::{Map, Value};

/// Rendering switches shared by every encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub timestamps: bool,
    /// Only the text encoder colors its output
    pub color_levels: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            timestamps: true,
            color_levels: false,
        }
    }
}

impl OutputFormat {
    /// Whether this encoding needs an enriched event to be meaningful
    pub fn requires_enrichment(&self) -> bool {
        matches!(self, OutputFormat::Enriched)
    }

    /// Encode one event as a single line without trailing newline.
    ///
    /// `Enriched` falls back to plain JSON for an event that carries no envelope.
    pub fn encode(&self, event: &Event, options: &EncodeOptions) -> Result<String> {
        match (self, event) {
            (OutputFormat::Text, _) => Ok(encode_text(event.record(), options)),
            (OutputFormat::Json, _) => encode_json(event.record(), options),
            (OutputFormat::Enriched, Event::Enriched(enriched)) => encode_enriched(enriched),
            (OutputFormat::Enriched, Event::Plain(record)) => encode_json(record, options),
        }
    }
}

fn encode_text(record: &LogRecord, options: &EncodeOptions) -> String {
    let label = format!("{:5}", record.level.label());
    let label = if options.color_levels {
        label.color(record.level.color_code()).to_string()
    } else {
        label
    };

    let mut line = if options.timestamps {
        format!("[{}] {} {}", wire_time(&record.timestamp), label, record.message)
    } else {
        format!("{} {}", label, record.message)
    };

    for (key, value) in record.fields.fields() {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&text_value(value));
    }
    line
}

/// Quote string values a reader could not otherwise split on spaces
fn text_value(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) if s.is_empty() || s.contains(needs_quotes) => {
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        other => other.to_string(),
    }
}

fn needs_quotes(c: char) -> bool {
    matches!(c, ' ' | '"' | '=')
}

fn encode_json(record: &LogRecord, options: &EncodeOptions) -> Result<String> {
    let mut obj: Map<String, Value> = record
        .fields
        .fields()
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json_value()))
        .collect();

    obj.insert(LEVEL_KEY.into(), Value::String(record.level.as_str().into()));
    obj.insert(MESSAGE_KEY.into(), Value::String(record.message.clone()));
    if options.timestamps {
        obj.insert(TIME_KEY.into(), Value::String(wire_time(&record.timestamp)));
    }

    Ok(serde_json::to_string(&Value::Object(obj))?)
}

fn encode_enriched(enriched: &EnrichedRecord) -> Result<String> {
    enriched.to_json()
}
