//! Enriched event envelope and its flat JSON wire form

use super::error::{LoggerError, Result};
use super::log_context::{FieldValue, LogContext};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

pub const LEVEL_KEY: &str = "level";
pub const TIME_KEY: &str = "time";
pub const MESSAGE_KEY: &str = "msg";
pub const ID_KEY: &str = "id";
pub const SOURCE_KEY: &str = "source";
pub const SPEC_VERSION_KEY: &str = "specversion";
pub const TYPE_KEY: &str = "type";
pub const SUBJECT_KEY: &str = "subject";

/// Wire timestamp: RFC 3339, UTC, millisecond precision
pub fn wire_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A log record plus its event envelope
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub record: LogRecord,
    pub id: String,
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    pub subject: Option<String>,
}

impl EnrichedRecord {
    /// Build the flat envelope object.
    ///
    /// Caller fields go in first so an envelope key always wins a collision.
    /// Without an envelope subject a caller `subject` field passes through.
    pub fn to_json_value(&self) -> Value {
        let mut obj: Map<String, Value> = self
            .record
            .fields
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json_value()))
            .collect();

        obj.insert(LEVEL_KEY.into(), Value::String(self.record.level.as_str().into()));
        obj.insert(TIME_KEY.into(), Value::String(wire_time(&self.record.timestamp)));
        obj.insert(MESSAGE_KEY.into(), Value::String(self.record.message.clone()));
        obj.insert(ID_KEY.into(), Value::String(self.id.clone()));
        obj.insert(SOURCE_KEY.into(), Value::String(self.source.clone()));
        obj.insert(SPEC_VERSION_KEY.into(), Value::String(self.spec_version.clone()));
        obj.insert(TYPE_KEY.into(), Value::String(self.event_type.clone()));
        if let Some(subject) = &self.subject {
            obj.insert(SUBJECT_KEY.into(), Value::String(subject.clone()));
        }

        Value::Object(obj)
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_value())?)
    }

    /// Parse a wire envelope back into an enriched record.
    ///
    /// The envelope subject is only ever the level string, so a `subject`
    /// holding anything else decodes as a caller field.
    pub fn from_json(json: &str) -> Result<Self> {
        let Value::Object(mut obj) = serde_json::from_str::<Value>(json)? else {
            return Err(LoggerError::formatter("enriched", "envelope is not a JSON object"));
        };

        let level = take_string(&mut obj, LEVEL_KEY)?
            .parse::<LogLevel>()
            .map_err(|e| LoggerError::formatter("enriched", format!("invalid level: {}", e)))?;
        let time = take_string(&mut obj, TIME_KEY)?;
        let timestamp = DateTime::parse_from_rfc3339(&time)
            .map_err(|e| LoggerError::formatter("enriched", format!("invalid time '{}': {}", time, e)))?
            .with_timezone(&Utc);
        let message = take_string(&mut obj, MESSAGE_KEY)?;
        let id = take_string(&mut obj, ID_KEY)?;
        let source = take_string(&mut obj, SOURCE_KEY)?;
        let spec_version = take_string(&mut obj, SPEC_VERSION_KEY)?;
        let event_type = take_string(&mut obj, TYPE_KEY)?;
        let subject = match obj.get(SUBJECT_KEY) {
            Some(Value::String(s)) if s == level.as_str() => {
                obj.remove(SUBJECT_KEY);
                Some(level.as_str().to_string())
            }
            _ => None,
        };

        let fields: LogContext = obj
            .iter()
            .filter_map(|(k, v)| FieldValue::from_json_value(v).map(|v| (k.clone(), v)))
            .collect();

        Ok(Self {
            record: LogRecord {
                level,
                message,
                fields,
                timestamp,
            },
            id,
            source,
            spec_version,
            event_type,
            subject,
        })
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Result<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(LoggerError::formatter(
            "enriched",
            format!("'{}' must be a string, found {}", key, other),
        )),
        None => Err(LoggerError::formatter(
            "enriched",
            format!("missing '{}'", key),
        )),
    }
}

/// What the router fans out: an enriched record, or the plain record when
/// enrichment is disabled or failed for this call
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Plain(LogRecord),
    Enriched(EnrichedRecord),
}

impl Event {
    pub fn record(&self) -> &LogRecord {
        match self {
            Event::Plain(record) => record,
            Event::Enriched(enriched) => &enriched.record,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.record().level
    }

    pub fn enriched(&self) -> Option<&EnrichedRecord> {
        match self {
            Event::Plain(_) => None,
            Event::Enriched(enriched) => Some(enriched),
        }
    }
}
