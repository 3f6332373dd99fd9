//! Event envelope settings

use super::validate::{Binder, Diagnostics};
use super::values::IdStrategy;

pub const DEFAULT_HMAC_KEY: &str = "event-logger";
pub const DEFAULT_SOURCE: &str = "urn:rust-event-logger:logger";
pub const DEFAULT_SPEC_VERSION: &str = "1.0";
pub const DEFAULT_EVENT_TYPE: &str = "io.rust-event-logger.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    pub id_strategy: IdStrategy,
    pub hmac_key: String,
    /// URI naming the event producer
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    /// Put the level string into the envelope `subject`
    pub subject_from_level: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::Hmac,
            hmac_key: DEFAULT_HMAC_KEY.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            spec_version: DEFAULT_SPEC_VERSION.to_string(),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            subject_from_level: true,
        }
    }
}

impl EnrichmentConfig {
    pub const COMPONENT: &'static str = "enrichment";

    pub fn apply_layer(&mut self, binder: &mut Binder<'_>) {
        binder.parse("id_strategy", &mut self.id_strategy);
        binder.string("hmac_key", &mut self.hmac_key);
        binder.string("source", &mut self.source);
        binder.string("spec_version", &mut self.spec_version);
        binder.string("event_type", &mut self.event_type);
        binder.bool("subject_from_level", &mut self.subject_from_level);
    }

    pub fn check(&self, diagnostics: &mut Diagnostics) {
        if let Err(e) = url::Url::parse(&self.source) {
            diagnostics.reject(
                Self::COMPONENT,
                "source",
                self.source.as_str(),
                format!("not a valid URI: {}", e),
            );
        }
        if self.spec_version.trim().is_empty() {
            diagnostics.reject(Self::COMPONENT, "spec_version", "", "must not be empty");
        }
        if self.event_type.trim().is_empty() {
            diagnostics.reject(Self::COMPONENT, "event_type", "", "must not be empty");
        }
        if self.id_strategy == IdStrategy::Hmac && self.hmac_key.is_empty() {
            diagnostics.reject(
                Self::COMPONENT,
                "hmac_key",
                "",
                "required when id_strategy is hmac",
            );
        }
    }
}
