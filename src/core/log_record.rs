//! Log record produced by a single log call

use super::log_context::{FieldValue, LogContext};
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};

/// One log call: level, message, structured fields and creation time
///
/// Sinks only ever see a shared reference, so a record is effectively
/// frozen once it leaves the logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: LogContext,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: Self::sanitize_message(&message.into()),
            fields: LogContext::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_fields(mut self, fields: LogContext) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.add_field(key, value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_sanitized() {
        let record = LogRecord::new(LogLevel::Info, "line one\nline two\tend");
        assert_eq!(record.message, "line one\\nline two\\tend");
    }

    #[test]
    fn test_builder_methods() {
        let ts = Utc::now();
        let record = LogRecord::new(LogLevel::Warn, "disk almost full")
            .with_field("mount", "/var")
            .with_field("used_pct", 93)
            .with_timestamp(ts);

        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.timestamp, ts);
    }
}
