//! Event envelope construction and identifier generation

use super::enriched_record::EnrichedRecord;
use super::error::{LoggerError, Result};
use super::log_record::LogRecord;
use crate::config::{EnrichmentConfig, IdStrategy};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Caller-supplied identifier generator for the `function` strategy
pub type IdCallback = Arc<dyn Fn(&LogRecord) -> std::result::Result<String, String> + Send + Sync>;

enum IdGenerator {
    Hmac { key: Vec<u8> },
    Uuid,
    Increment(AtomicU64),
    Function(IdCallback),
}

impl IdGenerator {
    fn next(&self, record: &LogRecord) -> Result<String> {
        match self {
            IdGenerator::Hmac { key } => {
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| LoggerError::enrichment(format!("invalid hmac key: {}", e)))?;
                mac.update(&content_digest_input(record));
                Ok(hex::encode(mac.finalize().into_bytes()))
            }
            IdGenerator::Uuid => Ok(uuid::Uuid::new_v4().to_string()),
            IdGenerator::Increment(counter) => {
                Ok(counter.fetch_add(1, Ordering::Relaxed).to_string())
            }
            IdGenerator::Function(callback) => callback(record)
                .map_err(|e| LoggerError::enrichment(format!("id callback failed: {}", e))),
        }
    }
}

/// Message then each field as `key=json` in key order
fn content_digest_input(record: &LogRecord) -> Vec<u8> {
    let mut input = record.message.clone().into_bytes();
    for (key, value) in record.fields.fields() {
        input.push(b'\n');
        input.extend_from_slice(key.as_bytes());
        input.push(b'=');
        input.extend_from_slice(value.to_json_value().to_string().as_bytes());
    }
    input
}

/// Builds envelopes for one logger instance
pub struct EventEnricher {
    strategy: IdStrategy,
    generator: IdGenerator,
    source: String,
    spec_version: String,
    event_type: String,
    subject_from_level: bool,
}

impl EventEnricher {
    /// `callback` is required for the `function` strategy and ignored otherwise
    pub fn new(config: &EnrichmentConfig, callback: Option<IdCallback>) -> Result<Self> {
        let generator = match config.id_strategy {
            IdStrategy::Hmac => IdGenerator::Hmac {
                key: config.hmac_key.as_bytes().to_vec(),
            },
            IdStrategy::Uuid => IdGenerator::Uuid,
            IdStrategy::Increment => IdGenerator::Increment(AtomicU64::new(1)),
            IdStrategy::Function => match callback {
                Some(callback) => IdGenerator::Function(callback),
                None => {
                    return Err(LoggerError::config(
                        "enrichment",
                        "id_strategy 'function' requires an id generator callback",
                    ))
                }
            },
        };

        Ok(Self {
            strategy: config.id_strategy,
            generator,
            source: config.source.clone(),
            spec_version: config.spec_version.clone(),
            event_type: config.event_type.clone(),
            subject_from_level: config.subject_from_level,
        })
    }

    pub fn strategy(&self) -> IdStrategy {
        self.strategy
    }

    /// Generate the next identifier; an empty identifier is an error
    pub fn next_id(&self, record: &LogRecord) -> Result<String> {
        let id = self.generator.next(record)?;
        if id.is_empty() {
            return Err(LoggerError::enrichment(format!(
                "{} strategy produced an empty id",
                self.strategy
            )));
        }
        Ok(id)
    }

    pub fn enrich(&self, record: &LogRecord) -> Result<EnrichedRecord> {
        let id = self.next_id(record)?;
        Ok(EnrichedRecord {
            record: record.clone(),
            id,
            source: self.source.clone(),
            spec_version: self.spec_version.clone(),
            event_type: self.event_type.clone(),
            subject: self
                .subject_from_level
                .then(|| record.level.as_str().to_string()),
        })
    }
}

impl fmt::Debug for EventEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnricher")
            .field("strategy", &self.strategy)
            .field("source", &self.source)
            .field("spec_version", &self.spec_version)
            .field("event_type", &self.event_type)
            .field("subject_from_level", &self.subject_from_level)
            .finish_non_exhaustive()
    }
}
