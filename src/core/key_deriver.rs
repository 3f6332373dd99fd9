//! Broker message key derivation

use super::error::{LoggerError, Result};
use super::log_context::FieldValue;
use super::log_record::LogRecord;
use crate::config::{KeyStrategy, ProducerConfig};
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    strategy: KeyStrategy,
    key_name: String,
}

impl KeyDeriver {
    pub fn new(strategy: KeyStrategy, key_name: impl Into<String>) -> Self {
        Self {
            strategy,
            key_name: key_name.into(),
        }
    }

    pub fn from_config(config: &ProducerConfig) -> Self {
        Self::new(config.key, config.key_name.clone())
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    pub fn derive_key(&self, record: &LogRecord) -> Result<Vec<u8>> {
        match self.strategy {
            KeyStrategy::Fixed => Ok(self.key_name.as_bytes().to_vec()),
            KeyStrategy::Extracted => match record.fields.get(&self.key_name) {
                Some(FieldValue::String(value)) => Ok(value.as_bytes().to_vec()),
                Some(other) => Err(LoggerError::missing_field(
                    self.key_name.as_str(),
                    format!("expected a string, found {}", other.kind()),
                )),
                None => Err(LoggerError::missing_field(
                    self.key_name.as_str(),
                    "field is absent",
                )),
            },
            KeyStrategy::TimeSeconds => Ok(Utc::now().timestamp().to_string().into_bytes()),
            KeyStrategy::TimeNanoseconds => {
                let now = Utc::now();
                // Out of the i64 nanosecond range after 2262; fall back to micros * 1000
                let nanos = now
                    .timestamp_nanos_opt()
                    .map(i128::from)
                    .unwrap_or_else(|| i128::from(now.timestamp_micros()) * 1000);
                Ok(nanos.to_string().into_bytes())
            }
            KeyStrategy::Level => Ok(record.level.as_str().as_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;

    #[test]
    fn test_fixed_key() {
        let deriver = KeyDeriver::new(KeyStrategy::Fixed, "user1");
        let record = LogRecord::new(LogLevel::Info, "anything").with_field("user", "other");
        assert_eq!(deriver.derive_key(&record).unwrap(), b"user1");
    }

    #[test]
    fn test_level_key() {
        let deriver = KeyDeriver::new(KeyStrategy::Level, "");
        let record = LogRecord::new(LogLevel::Warn, "disk");
        assert_eq!(deriver.derive_key(&record).unwrap(), b"warn");
    }

    #[test]
    fn test_extracted_key() {
        let deriver = KeyDeriver::new(KeyStrategy::Extracted, "tenant");
        let record = LogRecord::new(LogLevel::Info, "login").with_field("tenant", "acme");
        assert_eq!(deriver.derive_key(&record).unwrap(), b"acme");
    }

    #[test]
    fn test_extracted_key_missing_or_mistyped() {
        let deriver = KeyDeriver::new(KeyStrategy::Extracted, "tenant");

        let absent = LogRecord::new(LogLevel::Info, "login");
        assert!(matches!(
            deriver.derive_key(&absent),
            Err(LoggerError::MissingField { .. })
        ));

        let numeric = LogRecord::new(LogLevel::Info, "login").with_field("tenant", 42);
        let err = deriver.derive_key(&numeric).unwrap_err();
        assert!(err.to_string().contains("found int"));
    }

    #[test]
    fn test_time_keys_are_decimal_and_current() {
        let record = LogRecord::new(LogLevel::Info, "tick");
        let before = Utc::now().timestamp();

        let seconds = KeyDeriver::new(KeyStrategy::TimeSeconds, "")
            .derive_key(&record)
            .unwrap();
        let seconds: i64 = String::from_utf8(seconds).unwrap().parse().unwrap();
        assert!(seconds >= before && seconds <= before + 5);

        let nanos = KeyDeriver::new(KeyStrategy::TimeNanoseconds, "")
            .derive_key(&record)
            .unwrap();
        let nanos: i128 = String::from_utf8(nanos).unwrap().parse().unwrap();
        assert!(nanos / 1_000_000_000 >= i128::from(before));
    }

    #[test]
    fn test_from_config() {
        let config = ProducerConfig {
            key: KeyStrategy::Extracted,
            key_name: "request_id".to_string(),
            ..Default::default()
        };
        let deriver = KeyDeriver::from_config(&config);
        assert_eq!(deriver.strategy(), KeyStrategy::Extracted);
    }
}
